//! Coordinates requests between callers and the [`Transport`].
//!
//! Every request goes through [`RequestCoordinator::request`], which decides between three
//! paths:
//!
//! 1. **cache**: the caller asked for a cached response and the [`CacheStore`] has one for the
//!    same URL and method. The payload is returned without touching the network.
//! 2. **coalesce**: a `GET` for the same URL is already in flight. The caller is attached as an
//!    additional waiter to that call instead of issuing a second one.
//! 3. **fresh**: a new transport call is spawned, with the caller as its first waiter. Non-`GET`
//!    requests always take this path.
//!
//! Once a transport call completes, its response is classified, successful payloads are
//! cached, failures are published on the [`ErrorEventBus`], and all waiters of that call are
//! settled with the identical outcome in the order they attached.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use reqwest::header;
use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;

use crate::activity::{ActivityIndicator, NoActivityIndicator};
use crate::auth::{Authenticator, StaticHeaders};
use crate::cache::CacheStore;
use crate::classify::{Outcome, classify};
use crate::config::Config;
use crate::error::{Failure, RequestError};
use crate::events::{ERROR_EVENT, ErrorEventBus, HandlerId};
use crate::transport::Transport;
use crate::types::{Method, Payload, RequestSettings, ResourceKey};

/// The future returned for every coordinated request.
pub type ResponseFuture = BoxFuture<'static, Result<Payload, RequestError>>;

type CallResult = Result<Payload, RequestError>;

/// Identifies one transport call that waiters can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CallId(u64);

/// A caller waiting for the outcome of a transport call.
#[derive(Debug)]
struct PendingRequest {
    key: ResourceKey,
    call: CallId,
    waiter: oneshot::Sender<CallResult>,
}

/// The list of callers waiting for outstanding transport calls, in attachment order.
#[derive(Debug, Default)]
struct ActiveRequests {
    pending: Vec<PendingRequest>,
    next_call: u64,
}

impl ActiveRequests {
    /// The call currently in flight for `key`.
    fn in_flight(&self, key: &ResourceKey) -> Option<CallId> {
        self.pending
            .iter()
            .find(|pending| pending.key == *key)
            .map(|pending| pending.call)
    }

    fn new_call(&mut self) -> CallId {
        let call = CallId(self.next_call);
        self.next_call += 1;
        call
    }

    fn attach(&mut self, key: ResourceKey, call: CallId) -> oneshot::Receiver<CallResult> {
        let (waiter, receiver) = oneshot::channel();
        self.pending.push(PendingRequest { key, call, waiter });
        receiver
    }

    /// Removes and returns all waiters of `call`, keeping their order.
    fn take(&mut self, call: CallId) -> Vec<PendingRequest> {
        let (taken, remaining) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| pending.call == call);
        self.pending = remaining;
        taken
    }
}

/// The request coordination engine.
///
/// Construct one coordinator at startup and hand out clones of it. Clones share the cache,
/// the list of outstanding requests and the error bus.
#[derive(Clone)]
pub struct RequestCoordinator {
    base_url: Option<Url>,
    online_probe: Option<Url>,
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
    activity: Arc<dyn ActivityIndicator>,
    events: ErrorEventBus,
    cache: CacheStore,
    active: Arc<Mutex<ActiveRequests>>,
    /// Whether the activity indicator was last told that requests are outstanding.
    busy: Arc<Mutex<bool>>,
    runtime: tokio::runtime::Handle,
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("base_url", &self.base_url)
            .field("pending requests", &self.pending_count())
            .field("events", &self.events)
            .finish()
    }
}

impl RequestCoordinator {
    /// Creates a coordinator that spawns its transport calls on `runtime`.
    ///
    /// Requests are authenticated with the `auth_headers` from the `config`.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            online_probe: config.online_probe_url(),
            transport,
            authenticator: Arc::new(StaticHeaders::new(config.auth_headers.clone())),
            activity: Arc::new(NoActivityIndicator),
            events: ErrorEventBus::new(),
            cache: CacheStore::new(),
            active: Default::default(),
            busy: Default::default(),
            runtime,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_activity_indicator(mut self, activity: Arc<dyn ActivityIndicator>) -> Self {
        self.activity = activity;
        self
    }

    /// The bus that failures are published on.
    pub fn events(&self) -> &ErrorEventBus {
        &self.events
    }

    /// The store of successful payloads.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Registers an event handler on the error bus.
    pub fn on<F>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.events.on(name, handler)
    }

    /// Unregisters an event handler from the error bus.
    pub fn off(&self, name: &str, id: HandlerId) -> bool {
        self.events.off(name, id)
    }

    /// The number of callers currently waiting for a transport call.
    pub fn pending_count(&self) -> usize {
        self.active().pending.len()
    }

    fn active(&self) -> MutexGuard<'_, ActiveRequests> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Brings the activity indicator in line with the list of outstanding requests.
    ///
    /// Signals are sent while holding the `busy` lock and only for the state observed under
    /// it, so concurrent dispatches and settlements cannot deliver them out of order. The
    /// indicator must not issue requests from within its callbacks.
    fn sync_activity(&self) {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        let has_pending = !self.active().pending.is_empty();
        if *busy == has_pending {
            return;
        }

        *busy = has_pending;
        if has_pending {
            self.activity.activity_started();
        } else {
            self.activity.activity_idle();
        }
    }

    /// Resolves `url` against the configured base URL.
    fn resolve_url(&self, url: &str) -> Result<Url, RequestError> {
        let resolved = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        resolved.map_err(|err| RequestError::InvalidUrl {
            url: url.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Issues a request.
    ///
    /// Validation happens before anything else: a missing `url` fails with
    /// [`RequestError::MissingUrl`], a `POST` or `PUT` without `body` fails with
    /// [`RequestError::MissingBody`]. If `use_cache` is set and a payload for the same URL and
    /// method was cached, it is returned right away. Otherwise the request is dispatched via
    /// [`request_async`](Self::request_async).
    ///
    /// A present `body` is serialized as JSON. For non-`GET` requests with an object or array
    /// body, the JSON content type and accept headers are set as well.
    ///
    /// All side effects (attaching to an in-flight call or spawning a new one) happen before
    /// this returns, so requests are ordered by when this is called, not by when the returned
    /// future is first polled.
    pub fn request(
        &self,
        url: Option<&str>,
        use_cache: bool,
        method: Method,
        body: Option<Value>,
    ) -> ResponseFuture {
        let Some(url) = url.filter(|url| !url.is_empty()) else {
            return future::ready(Err(RequestError::MissingUrl)).boxed();
        };
        if method.requires_body() && body.is_none() {
            return future::ready(Err(RequestError::MissingBody(method))).boxed();
        }

        let resolved = match self.resolve_url(url) {
            Ok(resolved) => resolved,
            Err(err) => return future::ready(Err(err)).boxed(),
        };

        if use_cache && self.cache.contains(&ResourceKey::new(resolved.as_str(), method)) {
            return self.resolve_from_cache(resolved.as_str(), method);
        }

        let mut settings = RequestSettings::new(method);
        if let Some(body) = body {
            if method != Method::Get && (body.is_object() || body.is_array()) {
                settings = settings
                    .with_header(header::CONTENT_TYPE.as_str(), "application/json")
                    .with_header(header::ACCEPT.as_str(), "application/json");
            }
            settings.body = Some(body.to_string());
        }

        self.dispatch(resolved, settings)
    }

    /// Dispatches a request with prepared `settings`, bypassing validation and the cache.
    ///
    /// The settings are passed through the [`Authenticator`] first. A `GET` attaches to a call
    /// already in flight for the same URL, if there is one; every other method always results
    /// in a new transport call.
    pub fn request_async(&self, url: &str, settings: RequestSettings) -> ResponseFuture {
        match self.resolve_url(url) {
            Ok(resolved) => self.dispatch(resolved, settings),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    fn dispatch(&self, url: Url, settings: RequestSettings) -> ResponseFuture {
        let settings = self.authenticator.authenticate(settings);
        let key = ResourceKey::new(url.as_str(), settings.method);

        let (receiver, call, is_new) = {
            let mut active = self.active();
            let in_flight = match key.method {
                Method::Get => active.in_flight(&key),
                _ => None,
            };
            let (call, is_new) = match in_flight {
                Some(call) => (call, false),
                None => (active.new_call(), true),
            };
            let receiver = active.attach(key.clone(), call);
            metric!(gauge("requests.pending") = active.pending.len() as u64);
            (receiver, call, is_new)
        };

        self.sync_activity();

        if is_new {
            let this = self.clone();
            self.runtime
                .spawn(async move { this.start_request(call, key, settings).await });
        } else {
            metric!(counter("requests.coalesced") += 1);
            tracing::trace!(%key, "Attached to in-flight request");
        }

        async move { receiver.await.unwrap_or(Err(RequestError::Internal)) }.boxed()
    }

    /// Runs one transport call to completion and settles all of its waiters.
    ///
    /// The result is returned as well, but the waiters are the primary recipients.
    async fn start_request(
        self,
        call: CallId,
        key: ResourceKey,
        settings: RequestSettings,
    ) -> CallResult {
        metric!(counter("requests.transport") += 1, "method" => key.method.as_str());
        tracing::debug!(%key, "Starting request");
        let started = Instant::now();

        let result: CallResult = match self.transport.call(&key.url, &settings).await {
            Err(err) => {
                tracing::debug!(%key, error = %err, "Transport failed");
                Err(Failure::network(&err).into())
            }
            Ok(raw) => classify(&raw).and_then(|outcome| match outcome {
                Outcome::Success { payload, .. } => Ok(payload),
                Outcome::Failure(failure) => Err(failure.into()),
            }),
        };
        metric!(timer("requests.duration") = started.elapsed(), "method" => key.method.as_str());

        let result = match result {
            Ok(payload) => Ok(self.cache.save(key.clone(), payload)),
            Err(err) => {
                metric!(counter("requests.failed") += 1, "category" => err.category_str());
                self.events.emit(ERROR_EVENT, &err);
                Err(err)
            }
        };

        self.settle(call, &key, &result);
        result
    }

    /// Hands `result` to every waiter of `call`, in attachment order.
    fn settle(&self, call: CallId, key: &ResourceKey, result: &CallResult) {
        let waiters = {
            let mut active = self.active();
            let waiters = active.take(call);
            metric!(gauge("requests.pending") = active.pending.len() as u64);
            waiters
        };

        if waiters.is_empty() {
            tracing::warn!(%key, "Request completed without waiters");
        }

        for pending in waiters {
            // the caller may have stopped waiting, which is fine
            let _ = pending.waiter.send(result.clone());
        }

        self.sync_activity();
    }

    /// Returns the cached payload for `url` and `method` as an already completed future.
    ///
    /// Fails with [`RequestError::Internal`] if nothing is cached, which [`request`](Self::request)
    /// never does.
    pub fn resolve_from_cache(&self, url: &str, method: Method) -> ResponseFuture {
        let key = ResourceKey::new(url, method);
        let result = match self.cache.lookup(&key) {
            Some(payload) => {
                metric!(counter("requests.cache.hit") += 1, "method" => method.as_str());
                tracing::trace!(%key, "Resolved request from cache");
                Ok(payload)
            }
            None => {
                tracing::error!(%key, "Tried to resolve a request from an empty cache");
                Err(RequestError::Internal)
            }
        };
        future::ready(result).boxed()
    }

    /// Issues a `GET` request.
    pub fn get(&self, url: &str, use_cache: bool) -> ResponseFuture {
        self.request(Some(url), use_cache, Method::Get, None)
    }

    /// Issues a `POST` request.
    pub fn post(&self, url: &str, body: impl Into<Option<Value>>, use_cache: bool) -> ResponseFuture {
        self.request(Some(url), use_cache, Method::Post, body.into())
    }

    /// Issues a `PUT` request.
    pub fn put(&self, url: &str, body: impl Into<Option<Value>>, use_cache: bool) -> ResponseFuture {
        self.request(Some(url), use_cache, Method::Put, body.into())
    }

    /// Issues a `PATCH` request.
    pub fn patch(&self, url: &str, body: impl Into<Option<Value>>) -> ResponseFuture {
        self.request(Some(url), false, Method::Patch, body.into())
    }

    /// Issues a `DELETE` request.
    pub fn delete(&self, url: &str, body: impl Into<Option<Value>>) -> ResponseFuture {
        self.request(Some(url), false, Method::Delete, body.into())
    }

    /// Checks whether the configured origin can be reached.
    ///
    /// Any response, regardless of its status, counts as online. A transport failure, or a
    /// missing base URL, counts as offline. The probe bypasses authentication, the cache and
    /// the list of outstanding requests.
    pub async fn is_online(&self) -> bool {
        let Some(probe) = &self.online_probe else {
            tracing::debug!("No base url configured, assuming to be offline");
            return false;
        };

        let settings = RequestSettings::new(Method::Get)
            .with_credentials(crate::types::Credentials::SameOrigin);
        match self.transport.call(probe.as_str(), &settings).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(url = %probe, error = %err, "Online probe failed");
                false
            }
        }
    }
}
