use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_service::events::handlers::{
    self, APPLICATION_ERROR_ID, APPLICATION_ERROR_MESSAGE, AUTH_EXPIRED_MESSAGE, Notification,
    Notifier, Session,
};

use crate::{Server, setup_coordinator};

#[derive(Debug, Default)]
struct Recorder {
    notifications: Mutex<Vec<Notification>>,
    alerts: Mutex<Vec<String>>,
    redirects: Mutex<Vec<String>>,
}

impl Notifier for Recorder {
    fn display_error(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

impl Session for Recorder {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_owned());
    }

    fn redirect(&self, location: &str) {
        self.redirects.lock().unwrap().push(location.to_owned());
    }
}

#[tokio::test]
async fn test_standing_handlers() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});
    let recorder = Arc::new(Recorder::default());

    handlers::install(
        coordinator.events(),
        &Default::default(),
        coordinator.base_url(),
        recorder.clone(),
        recorder.clone(),
    );

    coordinator.get("status/404", false).await.unwrap_err();
    coordinator.get("status/503", false).await.unwrap_err();
    coordinator.get("status/401", false).await.unwrap_err();

    assert_eq!(
        *recorder.notifications.lock().unwrap(),
        [
            Notification {
                title: "Error:".into(),
                message: "failed with 404".into(),
                id: None,
                timeout: Duration::from_secs(20),
            },
            Notification {
                title: "Error:".into(),
                message: APPLICATION_ERROR_MESSAGE.into(),
                id: Some(APPLICATION_ERROR_ID.into()),
                timeout: Duration::from_secs(40),
            },
        ]
    );
    assert_eq!(*recorder.alerts.lock().unwrap(), [AUTH_EXPIRED_MESSAGE]);
    assert_eq!(
        *recorder.redirects.lock().unwrap(),
        [server.url("logout").to_string()]
    );
}
