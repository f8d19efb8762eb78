//! Common test utilities and helpers for vm-centos-api tests
//!
//! Builds the router around either a [`RecordingQueue`], which only captures
//! submissions, or a real [`LocalTaskQueue`] backed by the in-memory
//! hypervisor.

#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vm_centos_api::{create_app, AppState, Config};
use vm_centos_worker::test_utils::{fixture_hypervisor, images_dir, RecordingQueue};
use vm_centos_worker::{CentosDispatcher, LocalTaskQueue, MemoryHypervisor, TaskQueue};

pub const BASE: &str = "/api/2/inf/centos";
pub const TEST_URL: &str = "https://vlab.example.com";

pub fn test_config(verify_token: bool) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        url: TEST_URL.to_string(),
        verify_token,
        log_level: "debug".to_string(),
    }
}

/// Create a test app around `queue`, with token verification off
pub fn create_test_app(queue: Arc<dyn TaskQueue>) -> Router {
    create_app(AppState::new(queue, test_config(false)))
}

/// Expected `Link` header for task `id`
pub fn expected_link(id: &str) -> String {
    format!("<{}{}/task/{}>; rel=status", TEST_URL, BASE, id)
}

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: axum::response::Response) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

/// A live stack: in-memory hypervisor, worker pool and router
pub struct LiveStack {
    pub app: Router,
    pub queue: Arc<LocalTaskQueue>,
    pub hypervisor: MemoryHypervisor,
    pub images: TempDir,
}

impl LiveStack {
    /// `alice` owns a CentOS VM, a router VM and the `alice_frontend` network
    pub fn new() -> Self {
        let hypervisor = fixture_hypervisor("alice");
        let images = images_dir(&["CentOS-6.ova", "CentOS-7.ova", "CentOS-desktop-7.ova"]);
        Self::with(hypervisor, images)
    }

    pub fn with(hypervisor: MemoryHypervisor, images: TempDir) -> Self {
        let dir = images.path().to_path_buf();
        Self::with_dir(hypervisor, dir, images)
    }

    /// Run the worker against `dir` while `images` stays alive
    pub fn with_dir(hypervisor: MemoryHypervisor, dir: PathBuf, images: TempDir) -> Self {
        let dispatcher = CentosDispatcher::new(Arc::new(hypervisor.clone()), dir);
        let queue = Arc::new(LocalTaskQueue::spawn(dispatcher, 2));
        let app = create_test_app(queue.clone());

        Self {
            app,
            queue,
            hypervisor,
            images,
        }
    }
}

/// TestClient to encapsulate API interaction logic
pub struct TestClient {
    pub app: Router,
    pub queue: Arc<RecordingQueue>,
}

impl TestClient {
    /// Create a new TestClient around a recording queue
    pub fn new() -> Self {
        Self::with_queue(RecordingQueue::new())
    }

    pub fn with_queue(queue: RecordingQueue) -> Self {
        let queue = Arc::new(queue);
        let app = create_test_app(queue.clone());
        Self { app, queue }
    }

    /// Send a request to the API
    pub async fn send_request(
        &self,
        request: axum::http::Request<axum::body::Body>,
    ) -> axum::http::Response<axum::body::Body> {
        // Clone the app to allow reuse (Router is cheap to clone)
        use tower::ServiceExt;
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Request with an optional raw JSON body, authenticated as `user`
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<String>,
        extra_headers: &[(&str, &str)],
    ) -> axum::http::Response<axum::body::Body> {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(user) = user {
            builder = builder.header("x-user", user);
        }
        for (k, v) in extra_headers {
            builder = builder.header(*k, *v);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };

        self.send_request(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str, user: &str) -> axum::http::Response<axum::body::Body> {
        self.request("GET", uri, Some(user), None, &[]).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        user: &str,
        body: serde_json::Value,
    ) -> axum::http::Response<axum::body::Body> {
        self.request(method, uri, Some(user), Some(body.to_string()), &[])
            .await
    }
}

/// Poll the task-status endpoint until the task leaves pending/running
pub async fn wait_for_task(app: &Router, user: &str, id: &str) -> axum::http::Response<Body> {
    use tower::ServiceExt;

    for _ in 0..200 {
        let request = Request::builder()
            .method("GET")
            .uri(format!("{}/task/{}", BASE, id))
            .header("x-user", user)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        if response.status() != axum::http::StatusCode::ACCEPTED {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("Task {} did not finish", id);
}
