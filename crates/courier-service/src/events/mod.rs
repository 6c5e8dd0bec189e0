//! A publish/subscribe channel for failures.
//!
//! Every failed call is published on the [`ErrorEventBus`] under [`ERROR_EVENT`] in addition
//! to being returned to its callers, so observers such as a notification layer can react
//! without being wired into the call path. See [`handlers`] for the standing subscriptions.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::RequestError;

pub mod handlers;

/// The name of the event that failures are published under.
pub const ERROR_EVENT: &str = "error";

/// Identifies a registered handler, used to unregister it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    handlers: HashMap<String, Vec<(HandlerId, Handler<T>)>>,
}

/// An observer registry keyed by event name.
///
/// Handlers are invoked synchronously, in registration order. A handler that panics is logged
/// and skipped; the remaining handlers still receive the event.
pub struct EventBus<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

/// The bus failures are published on.
pub type ErrorEventBus = EventBus<RequestError>;

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: HashMap::new(),
            })),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `handler` for events called `name`.
    pub fn on<F>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = HandlerId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(name.to_owned())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregisters the handler `id` from events called `name`.
    ///
    /// Returns `false` if no such handler was registered.
    pub fn off(&self, name: &str, id: HandlerId) -> bool {
        let mut registry = self.registry();
        let Some(handlers) = registry.handlers.get_mut(name) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            registry.handlers.remove(name);
        }
        removed
    }

    /// The number of handlers registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.registry().handlers.get(name).map_or(0, Vec::len)
    }

    /// Delivers `payload` to every handler registered for `name`.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn emit(&self, name: &str, payload: &T) -> usize {
        // Handlers run without the lock held, so they are free to (un)register handlers.
        let handlers: Vec<_> = match self.registry().handlers.get(name) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    metric!(counter("events.handler_panic") += 1, "event" => name);
                    tracing::error!(event = name, "Event handler panicked");
                }
            }
        }
        delivered
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry();
        let mut names: Vec<_> = registry.handlers.keys().collect();
        names.sort();
        f.debug_struct("EventBus")
            .field("events", &names)
            .field("next_id", &registry.next_id)
            .finish()
    }
}
