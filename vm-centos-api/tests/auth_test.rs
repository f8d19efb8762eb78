//! Tests for caller identification
//!
//! With token verification enabled only the auth proxy headers identify the
//! caller. Requests without an identity never submit a task.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::{test_config, BASE};
use serde_json::json;
use std::sync::Arc;
use vm_centos_api::{create_app, AppState};
use vm_centos_worker::test_utils::RecordingQueue;

fn create_test_server(verify_token: bool) -> (TestServer, Arc<RecordingQueue>) {
    let queue = Arc::new(RecordingQueue::new());
    let app = create_app(AppState::new(queue.clone(), test_config(verify_token)));

    (
        TestServer::new(app).expect("Failed to create test server"),
        queue,
    )
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (server, queue) = create_test_server(false);

    server.get(BASE).await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .post(BASE)
        .json(&json!({"name": "web01", "image": "7", "network": "frontend"}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get(&format!("{}/task/task-1", BASE))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert!(queue.sent().is_empty());
}

#[tokio::test]
async fn test_dev_header_rejected_when_verifying() {
    let (server, queue) = create_test_server(true);

    server
        .get(BASE)
        .add_header("x-user", "alice")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert!(queue.sent().is_empty());
}

#[tokio::test]
async fn test_proxy_headers_accepted_when_verifying() {
    let (server, queue) = create_test_server(true);

    server
        .get(BASE)
        .add_header("x-vm-user", "alice")
        .await
        .assert_status(StatusCode::ACCEPTED);
    server
        .get(BASE)
        .add_header("x-forwarded-user", "bob")
        .await
        .assert_status(StatusCode::ACCEPTED);

    let users: Vec<_> = queue.sent().into_iter().map(|t| t.args[0].clone()).collect();
    assert_eq!(users, vec![json!("alice"), json!("bob")]);
}

#[tokio::test]
async fn test_username_scopes_network() {
    let (server, queue) = create_test_server(true);

    server
        .post(BASE)
        .add_header("x-vm-user", "carol")
        .json(&json!({"name": "web01", "image": "7", "network": "frontend"}))
        .await
        .assert_status(StatusCode::ACCEPTED);

    assert_eq!(queue.sent()[0].args[3], json!("carol_frontend"));
}

#[tokio::test]
async fn test_health_open_when_verifying() {
    let (server, _) = create_test_server(true);

    server.get("/health").await.assert_status_ok();
}
