//! End-to-end lifecycle tests for the request server.
//!
//! Each test runs a real server on a temp Unix socket or an ephemeral TCP
//! port and talks to it over the wire.

use std::os::unix::fs::{FileTypeExt, PermissionsExt};

use hyper::{Method, StatusCode};
use pretty_assertions::assert_eq;
use sockserve_core::{ServerPhase, ServiceIdentity, ShutdownTrigger};
use sockserve_test_utils::tracing_setup::init_test_tracing;
use sockserve_test_utils::{TestConfigBuilder, TestServer};

const PYTHON_API: ServiceIdentity = ServiceIdentity::new("python-api", "python");

#[tokio::test]
async fn test_health_over_tcp() {
    init_test_tracing();
    let server = TestServer::tcp(PYTHON_API).await;

    let resp = server.client().get("/health").await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.text(), r#"{"status":"ok","service":"python-api"}"#);

    assert_eq!(server.stop().await.unwrap(), ShutdownTrigger::Requested);
}

#[tokio::test]
async fn test_unix_socket_mode_and_type() {
    init_test_tracing();
    let server = TestServer::unix(PYTHON_API).await;
    let path = server.socket_path().unwrap().to_path_buf();

    let meta = std::fs::metadata(&path).unwrap();
    assert!(meta.file_type().is_socket());
    assert_eq!(meta.permissions().mode() & 0o777, 0o777);

    let info = server.client().info().await.unwrap();
    assert_eq!(info.service, "python-api");
    assert_eq!(info.language, "python");

    server.stop().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_labels_reach_info_endpoint() {
    let config = TestConfigBuilder::new()
        .ephemeral_tcp()
        .environment("staging")
        .version("1.2.3")
        .build();
    let server = TestServer::start(config, PYTHON_API).await;

    let resp = server.client().get("/").await.unwrap();
    assert_eq!(
        resp.text(),
        r#"{"service":"python-api","language":"python","env":"staging","version":"1.2.3"}"#
    );
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_not_found_on_both_transports() {
    for server in [
        TestServer::tcp(PYTHON_API).await,
        TestServer::unix(PYTHON_API).await,
    ] {
        let client = server.client();
        let resp = client.get("/nonexistent").await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "on {}", server.addr);
        assert!(resp.body.is_empty());

        let resp = client.request(Method::POST, "/").await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "on {}", server.addr);
        assert!(resp.body.is_empty());

        server.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_stale_socket_file_is_replaced() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("stale.sock");
    std::fs::write(&path, b"stale").unwrap();

    let config = TestConfigBuilder::new().unix_socket(&path).build();
    let server = TestServer::start(config, PYTHON_API).await;
    assert!(std::fs::metadata(&path).unwrap().file_type().is_socket());

    let health = server.client().health().await.unwrap();
    assert_eq!(health.status, "ok");

    server.stop().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_requests_are_recorded_with_service_tag() {
    let server = TestServer::unix(PYTHON_API).await;
    let client = server.client();
    client.get("/health").await.unwrap();
    client.get("/").await.unwrap();
    client.get("/missing").await.unwrap();

    let lines: Vec<String> = server
        .requests
        .records()
        .iter()
        .map(|r| format!("[{}] {} {} {}", r.service, r.method, r.path, r.status))
        .collect();
    assert_eq!(
        lines,
        vec![
            "[python-api] GET /health 200",
            "[python-api] GET / 200",
            "[python-api] GET /missing 404",
        ]
    );
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests() {
    let server = TestServer::tcp(PYTHON_API).await;
    let mut handles = Vec::new();
    for _ in 0..16 {
        let client = server.client();
        handles.push(tokio::spawn(async move { client.health().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().service, "python-api");
    }
    assert_eq!(server.requests.len(), 16);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stopped_server_refuses_connections() {
    let server = TestServer::unix(PYTHON_API).await;
    assert_eq!(server.phase(), ServerPhase::Serving);

    let client = server
        .client()
        .with_timeout(std::time::Duration::from_secs(1));
    client.health().await.unwrap();

    let path = server.socket_path().unwrap().to_path_buf();
    server.stop().await.unwrap();
    assert!(!path.exists());
    assert!(client.health().await.is_err());
}
