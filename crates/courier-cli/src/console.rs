//! Terminal renditions of the notification and session collaborators.

use console::style;
use courier_service::activity::ActivityIndicator;
use courier_service::events::handlers::{Notification, Notifier, Session};

/// Prints error notifications to `stderr`.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn display_error(&self, notification: Notification) {
        eprintln!(
            "{} {}",
            style(&notification.title).red().bold(),
            notification.message
        );
    }
}

/// A session that cannot be redirected, so it only reports what would happen.
#[derive(Debug, Default)]
pub struct ConsoleSession;

impl Session for ConsoleSession {
    fn alert(&self, message: &str) {
        eprintln!("{}", style(message).yellow());
    }

    fn redirect(&self, location: &str) {
        eprintln!("{} {location}", style("Log in again at").dim());
    }
}

#[derive(Debug, Default)]
pub struct LoggingActivity;

impl ActivityIndicator for LoggingActivity {
    fn activity_started(&self) {
        tracing::debug!("Waiting for responses");
    }

    fn activity_idle(&self) {
        tracing::debug!("All responses received");
    }
}
