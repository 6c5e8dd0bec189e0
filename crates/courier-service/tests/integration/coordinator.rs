use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use courier_service::types::Method;
use courier_service::{ERROR_EVENT, Payload, RawStatus, RequestError, StatusCategory};
use futures::future::join_all;
use serde_json::json;

use crate::{Server, setup_coordinator, unreachable_url};

#[tokio::test]
async fn test_get_json() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    let payload = coordinator.get("json", false).await.unwrap();
    let json = payload.as_json().unwrap();
    assert_eq!(json["foo"], "bar");

    let headers = payload.headers().unwrap();
    assert_eq!(headers["x-request-id"], "courier-test");
    assert_eq!(headers["content-type"], "application/json");

    let payload = coordinator.get("list", false).await.unwrap();
    assert_eq!(payload, Payload::Json(json!([1, 2, 3])));

    let payload = coordinator.get("text", false).await.unwrap();
    assert_eq!(payload, Payload::Text("hello world".into()));
}

#[tokio::test]
async fn test_concurrent_gets_hit_server_once() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    let requests: Vec<_> = (0..5)
        .map(|_| coordinator.get("delay/100ms", false))
        .collect();
    let results = join_all(requests).await;

    assert_eq!(server.hits("delay/100ms"), 1);
    for result in results {
        assert_eq!(result.unwrap().as_json().unwrap()["delayed"], "100ms");
    }
}

#[tokio::test]
async fn test_concurrent_posts_hit_server_each() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |config| {
        config
            .auth_headers
            .insert("X-CSRF-Token".into(), "csrf-secret".into());
    });

    let requests: Vec<_> = (0..3)
        .map(|i| coordinator.post("echo", json!({ "n": i }), false))
        .collect();
    let results = join_all(requests).await;
    assert_eq!(server.hits("echo"), 3);

    for (i, result) in results.into_iter().enumerate() {
        let payload = result.unwrap();
        let echoed = payload.as_json().unwrap();
        assert_eq!(echoed["method"], "POST");
        assert_eq!(echoed["csrf"], "csrf-secret");
        assert_eq!(echoed["content_type"], "application/json");
        assert_eq!(echoed["body"]["n"], i);
    }
}

#[tokio::test]
async fn test_cached_get() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    let first = coordinator.get("json", true).await.unwrap();
    let second = coordinator.get("json", true).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(server.hits("json"), 1);

    coordinator.get("json", false).await.unwrap();
    assert_eq!(server.hits("json"), 2);
}

#[tokio::test]
async fn test_error_status() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    let emitted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&emitted);
    coordinator.on(ERROR_EVENT, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let results = join_all([
        coordinator.get("status/503", true),
        coordinator.get("status/503", true),
    ])
    .await;
    assert_eq!(server.hits("status/503"), 1);
    assert_eq!(emitted.load(Ordering::SeqCst), 1);

    for result in results {
        let err = result.unwrap_err();
        let failure = err.failure().unwrap();
        assert_eq!(err.to_string(), "failed with 503");
        assert_eq!(failure.status, RawStatus::Code(503));
        assert_eq!(failure.category, StatusCategory::ServerError);
        assert_eq!(failure.response.as_ref().unwrap().status_text, "Service Unavailable");
    }

    // failures are never cached
    coordinator.get("status/503", true).await.unwrap_err();
    assert_eq!(server.hits("status/503"), 2);
}

#[tokio::test]
async fn test_delete_and_patch() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    let payload = coordinator.delete("echo", None).await.unwrap();
    assert_eq!(payload.as_json().unwrap()["method"], "DELETE");
    assert_eq!(payload.as_json().unwrap()["body"], serde_json::Value::Null);

    let payload = coordinator.patch("echo", json!({"name": "x"})).await.unwrap();
    assert_eq!(payload.as_json().unwrap()["method"], "PATCH");
    assert_eq!(payload.as_json().unwrap()["body"]["name"], "x");

    let err = coordinator.put("echo", None, false).await.unwrap_err();
    assert_eq!(err, RequestError::MissingBody(Method::Put));
    assert_eq!(server.hits("echo"), 2);
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    let err = coordinator.get("broken", false).await.unwrap_err();
    assert!(matches!(err, RequestError::Decode(_)));
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test]
async fn test_network_failure() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |config| {
        config.base_url = Some(unreachable_url());
    });

    let err = coordinator.get("json", false).await.unwrap_err();
    let failure = err.failure().unwrap();
    assert_eq!(failure.status, RawStatus::NetworkRequestFailed);
    assert_eq!(failure.category, StatusCategory::NetworkUnreachable);
    assert_eq!(server.accesses(), 0);
}

#[tokio::test]
async fn test_is_online() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});
    assert!(coordinator.is_online().await);
    assert_eq!(server.hits("favicon.ico"), 1);

    let coordinator = setup_coordinator(&server, |config| {
        config.base_url = Some(unreachable_url());
    });
    assert!(!coordinator.is_online().await);
}

#[tokio::test]
async fn test_credentials_are_included() {
    let server = Server::new();
    let coordinator = setup_coordinator(&server, |_| {});

    coordinator.get("cookies/set", false).await.unwrap();
    let payload = coordinator.get("echo", false).await.unwrap();
    assert_eq!(payload.as_json().unwrap()["cookie"], "session=courier");
}
