//! Helpers for testing the coordinator against a real HTTP server.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Make sure that the [`Server`] is held until all requests to it have been made. Dropping it
//!    stops serving, and all further connections to it fail. To avoid this, assign it to a
//!    variable: `let server = Server::new();`.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{self, OriginalUri, Request};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::routing::{any, get};
use axum::{Extension, Json, Router};
use hyper::ext::ReasonPhrase;
use reqwest::Url;
use serde_json::{Value, json};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `courier_service` crate and mutes
///    all other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("courier_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Returns a URL that no server listens on.
///
/// Connections to this URL are refused.
pub fn unreachable_url() -> Url {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    format!("http://127.0.0.1:{port}/").parse().unwrap()
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    };

    Json(json!({
        "method": method.as_str(),
        "csrf": header("x-csrf-token"),
        "content_type": header("content-type"),
        "cookie": header("cookie"),
        "body": serde_json::from_slice::<Value>(&body).ok(),
    }))
}

fn router() -> Router {
    Router::new()
        .route(
            "/favicon.ico",
            get(|| async { ([(header::CONTENT_TYPE, "image/x-icon")], Bytes::new()) }),
        )
        .route(
            "/json",
            get(|| async { ([("x-request-id", "courier-test")], Json(json!({"foo": "bar"}))) }),
        )
        .route("/list", get(|| async { Json(json!([1, 2, 3])) }))
        .route("/text", get(|| async { "hello world" }))
        .route(
            "/broken",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{not json") }),
        )
        .route(
            "/delay/:time",
            get(|extract::Path(time): extract::Path<String>| async move {
                let duration = humantime::parse_duration(&time).unwrap();
                tokio::time::sleep(duration).await;
                Json(json!({"delayed": time}))
            }),
        )
        .route(
            "/status/:code",
            any(|extract::Path(code): extract::Path<u16>| async move {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(json!({"error": format!("failed with {code}")})))
            }),
        )
        .route(
            "/maintenance",
            get(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Extension(ReasonPhrase::from_static(b"Down For Maintenance")),
                    "maintenance",
                )
            }),
        )
        .route(
            "/cookies/set",
            get(|| async { ([(header::SET_COOKIE, "session=courier; Path=/")], "ok") }),
        )
        .route("/echo", any(echo))
}

/// A test server that binds to a random port.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
///
/// Every request is counted by its path, see [`hits`](Self::hits).
///
/// Routes:
///  - `/favicon.ico`: an empty icon.
///  - `/json`: `{"foo":"bar"}` with an `x-request-id` header.
///  - `/list`: a JSON array.
///  - `/text`: a plain text body.
///  - `/broken`: a JSON content type with an invalid body.
///  - `/delay/<time>`: JSON, after sleeping for a [`humantime`] duration.
///  - `/status/<code>`: a JSON error body with the given status, for any method.
///  - `/maintenance`: a 503 with the reason phrase `Down For Maintenance`.
///  - `/cookies/set`: sets a `session` cookie.
///  - `/echo`: echoes method, body and a few headers as JSON, for any method.
#[derive(Debug)]
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    hits: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl Server {
    pub fn new() -> Self {
        let hits = Arc::new(Mutex::new(BTreeMap::new()));

        let hitcounter = {
            let hits = hits.clone();
            move |OriginalUri(uri): OriginalUri, req: Request, next: Next| {
                let hits = hits.clone();
                async move {
                    {
                        let mut hits = hits.lock().unwrap();
                        let hits = hits.entry(uri.path().to_owned()).or_default();
                        *hits += 1;
                    }

                    next.run(req).await
                }
            }
        };

        let router = router().layer(middleware::from_fn(hitcounter));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            handle,
            socket,
            hits,
        }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the root URL of this server, to be used as a base URL.
    pub fn base_url(&self) -> Url {
        self.url("")
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://{}/{}", self.addr(), path).parse().unwrap()
    }

    /// Returns how often `path` was requested so far.
    pub fn hits(&self, path: &str) -> usize {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.hits.lock().unwrap().get(&path).copied().unwrap_or(0)
    }

    /// Returns the number of requests since the last call, and resets the counter.
    pub fn accesses(&self) -> usize {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_values().sum()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
