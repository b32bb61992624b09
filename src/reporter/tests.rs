use super::*;
use crate::config::ReporterConfig;
use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Spawn a backend on an ephemeral port and return its scan URL
async fn spawn_backend(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/scan-code", addr)
}

fn reporter_for(endpoint: String) -> HttpReporter {
    HttpReporter::new(ReporterConfig {
        endpoint,
        timeout_ms: 2_000,
        ..ReporterConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_success_with_backend_message() {
    let received = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = received.clone();
    let router = Router::new().route(
        "/scan-code",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().await.push(body);
                Json(json!({ "message": "Product 5901234123457 registered" }))
            }
        }),
    );

    let reporter = reporter_for(spawn_backend(router).await);
    let outcome = reporter.report("5901234123457").await;

    assert_eq!(
        outcome,
        ScanOutcome::success("Product 5901234123457 registered")
    );
    let bodies = received.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0], json!({ "code": "5901234123457" }));
}

#[tokio::test]
async fn test_success_without_message_uses_default() {
    let router = Router::new().route("/scan-code", post(|| async { "ok" }));
    let reporter = reporter_for(spawn_backend(router).await);

    let outcome = reporter.report("96385074").await;
    assert!(outcome.success);
    assert_eq!(outcome.message, ReporterConfig::default().success_message);
}

#[tokio::test]
async fn test_server_error_is_failure() {
    let router = Router::new().route(
        "/scan-code",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let reporter = reporter_for(spawn_backend(router).await);

    let outcome = reporter.report("96385074").await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Internal Server Error");
}

#[tokio::test]
async fn test_rejection_carries_backend_message() {
    let router = Router::new().route(
        "/scan-code",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "Unknown product" })),
            )
        }),
    );
    let reporter = reporter_for(spawn_backend(router).await);

    assert_eq!(
        reporter.report("0000000000000").await,
        ScanOutcome::failure("Unknown product")
    );
}

#[tokio::test]
async fn test_transport_failure() {
    // bind then drop so nothing is listening on the port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let reporter = reporter_for(format!("http://{}/scan-code", addr));
    let outcome = reporter.report("5901234123457").await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, ReporterConfig::default().failure_message);
}
