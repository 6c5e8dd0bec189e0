//! The standing subscriptions to [`ERROR_EVENT`].
//!
//! Two handlers are installed on the error bus:
//!
//! - an authentication handler, which alerts the user and redirects the session to the logout
//!   destination whenever a failure carries the `401` status, and
//! - a notification handler, which displays a titled error notification for every other
//!   failure. Failures with one of the [`APPLICATION_ERROR_STATUSES`] get a generic message,
//!   a longer timeout and a de-duplicating identifier.
//!
//! Presentation is left to the [`Notifier`] and [`Session`] collaborators.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::NotificationConfig;
use crate::error::RequestError;

use super::{ERROR_EVENT, ErrorEventBus, HandlerId};

/// The status that forces a logout.
pub const AUTH_EXPIRED_STATUS: u16 = 401;

/// Statuses that indicate a problem with the application rather than with the request.
pub const APPLICATION_ERROR_STATUSES: [u16; 5] = [408, 444, 500, 503, 504];

/// The title of every error notification.
pub const NOTIFICATION_TITLE: &str = "Error:";

/// The identifier that de-duplicates application error notifications.
pub const APPLICATION_ERROR_ID: &str = "application-errors";

/// The message shown for application errors.
pub const APPLICATION_ERROR_MESSAGE: &str = "We're currently experiencing problems with our \
     application. Please wait a moment and refresh, if the problems persist please contact support.";

/// The alert shown before a forced logout.
pub const AUTH_EXPIRED_MESSAGE: &str =
    "Your user is not currently authenticated, please log in again.";

/// An error notification to be displayed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Notifications sharing an identifier replace each other instead of stacking up.
    pub id: Option<String>,
    pub timeout: Duration,
}

/// Displays error notifications.
pub trait Notifier: Send + Sync {
    fn display_error(&self, notification: Notification);
}

/// Controls the user session.
pub trait Session: Send + Sync {
    /// Shows a blocking alert with `message`.
    fn alert(&self, message: &str);

    /// Sends the session to `location`.
    fn redirect(&self, location: &str);
}

/// How a failure is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRoute {
    /// Force a logout.
    AuthExpired,
    /// Show the generic, de-duplicated application error.
    Application,
    /// Show the error's own message.
    Default,
}

impl ErrorRoute {
    pub fn for_error(error: &RequestError) -> Self {
        match error.status_code() {
            Some(AUTH_EXPIRED_STATUS) => Self::AuthExpired,
            Some(status) if APPLICATION_ERROR_STATUSES.contains(&status) => Self::Application,
            _ => Self::Default,
        }
    }
}

/// Builds the notification for `error`, or `None` if it forces a logout instead.
pub fn notification_for(error: &RequestError, config: &NotificationConfig) -> Option<Notification> {
    match ErrorRoute::for_error(error) {
        ErrorRoute::AuthExpired => None,
        ErrorRoute::Application => Some(Notification {
            title: NOTIFICATION_TITLE.to_owned(),
            message: APPLICATION_ERROR_MESSAGE.to_owned(),
            id: Some(APPLICATION_ERROR_ID.to_owned()),
            timeout: config.application_timeout,
        }),
        ErrorRoute::Default => Some(Notification {
            title: NOTIFICATION_TITLE.to_owned(),
            message: error.to_string(),
            id: None,
            timeout: config.default_timeout,
        }),
    }
}

/// Resolves the logout destination against `base_url`.
///
/// Without a base URL, the configured path is used as-is.
pub fn logout_location(base_url: Option<&Url>, config: &NotificationConfig) -> String {
    base_url
        .and_then(|base| base.join(&config.logout_path).ok())
        .map_or_else(|| config.logout_path.clone(), String::from)
}

/// Installs the authentication and notification handlers on `bus`.
///
/// Returns the ids of both handlers, in that order.
pub fn install(
    bus: &ErrorEventBus,
    config: &NotificationConfig,
    base_url: Option<&Url>,
    notifier: Arc<dyn Notifier>,
    session: Arc<dyn Session>,
) -> [HandlerId; 2] {
    let logout = logout_location(base_url, config);
    let auth = bus.on(ERROR_EVENT, move |error| {
        if ErrorRoute::for_error(error) == ErrorRoute::AuthExpired {
            tracing::info!(location = %logout, "Authentication expired, logging out");
            session.alert(AUTH_EXPIRED_MESSAGE);
            session.redirect(&logout);
        }
    });

    let config = config.clone();
    let notify = bus.on(ERROR_EVENT, move |error| {
        if let Some(notification) = notification_for(error, &config) {
            notifier.display_error(notification);
        }
    });

    [auth, notify]
}
