//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::activity::ActivityIndicator;
use crate::events::handlers::{Notification, Notifier, Session};
use crate::transport::{Transport, TransportError};
use crate::types::{RawResponse, RequestSettings};

type Reply = Result<RawResponse, TransportError>;

/// A [`Transport`] that answers with scripted replies.
///
/// Replies are queued per URL. The last reply of a queue is repeated for all further calls.
/// Calls to URLs without replies fail with [`TransportError::Connect`].
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, RequestSettings)>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that holds every call until it is [`release`](Self::release)d.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn reply(self, url: &str, reply: Reply) -> Self {
        self.push(url, reply);
        self
    }

    pub fn push(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_owned())
            .or_default()
            .push_back(reply);
    }

    /// Lets `count` held calls complete.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<(String, RequestSettings)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(TransportError::Connect(format!("no reply for {url}"))),
        }
    }
}

impl Transport for MockTransport {
    fn call<'a>(
        &'a self,
        url: &'a str,
        settings: &'a RequestSettings,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_owned(), settings.clone()));

        async move {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.next_reply(url)
        }
        .boxed()
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn display_error(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

#[derive(Debug, Default)]
pub struct RecordingSession {
    alerts: Mutex<Vec<String>>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingSession {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Session for RecordingSession {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_owned());
    }

    fn redirect(&self, location: &str) {
        self.redirects.lock().unwrap().push(location.to_owned());
    }
}

/// Records busy signals as `"started"` and `"idle"`.
#[derive(Debug, Default)]
pub struct RecordingActivity {
    signals: Mutex<Vec<&'static str>>,
}

impl RecordingActivity {
    pub fn signals(&self) -> Vec<&'static str> {
        self.signals.lock().unwrap().clone()
    }
}

impl ActivityIndicator for RecordingActivity {
    fn activity_started(&self) {
        self.signals.lock().unwrap().push("started");
    }

    fn activity_idle(&self) {
        self.signals.lock().unwrap().push("idle");
    }
}
