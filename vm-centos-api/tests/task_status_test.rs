//! End-to-end tests: submit through the API, run on the worker pool against
//! the in-memory hypervisor, then read the outcome from the status endpoint.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{expected_link, extract_json_body, wait_for_task, LiveStack, BASE};
use serde_json::{json, Value};
use tower::ServiceExt;
use vm_centos_worker::test_utils::{fixture_hypervisor, images_dir};
use vm_centos_worker::{TaskQueue, TaskStatus};

async fn submit(stack: &LiveStack, method: &str, uri: &str, body: Option<Value>) -> String {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user", "alice");
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = stack
        .app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let accepted: Value = extract_json_body(response).await;
    accepted["content"]["task-id"]
        .as_str()
        .expect("task-id missing")
        .to_string()
}

#[tokio::test]
async fn test_show_lists_only_centos_vms() {
    let stack = LiveStack::new();
    let id = submit(&stack, "GET", BASE, None).await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Value = extract_json_body(response).await;
    assert_eq!(envelope["error"], Value::Null);
    assert_eq!(envelope["params"], json!({}));
    assert!(envelope["content"]["alice-centos"].is_object());
    assert!(envelope["content"].get("alice-router").is_none());
    assert_eq!(envelope["content"]["alice-centos"]["meta"]["component"], "CentOS");
}

#[tokio::test]
async fn test_create_deploys_into_user_network() {
    let stack = LiveStack::new();
    let id = submit(
        &stack,
        "POST",
        BASE,
        Some(json!({"name": "web01", "image": "7", "network": "frontend", "ram": 6, "cpu-count": 8})),
    )
    .await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Value = extract_json_body(response).await;
    assert_eq!(envelope["error"], Value::Null);
    assert_eq!(envelope["content"]["web01"]["state"], "poweredOn");
    assert_eq!(envelope["content"]["web01"]["meta"]["version"], "7");

    let vm = stack.hypervisor.find_vm("alice", "web01").expect("VM missing");
    assert_eq!(vm.ram_mb, 6 * 1024);
    assert_eq!(vm.cpu_count, 8);
    assert_eq!(vm.networks, vec!["alice_frontend".to_string()]);
}

#[tokio::test]
async fn test_create_with_unknown_image_reports_error() {
    let stack = LiveStack::new();
    let id = submit(
        &stack,
        "POST",
        BASE,
        Some(json!({"name": "web01", "image": "5", "network": "frontend"})),
    )
    .await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Value = extract_json_body(response).await;
    assert_eq!(envelope["error"], "Invalid version of CentOS supplied: 5");
    assert_eq!(envelope["content"], json!({}));
    assert!(stack.hypervisor.find_vm("alice", "web01").is_none());
}

#[tokio::test]
async fn test_delete_missing_vm_reports_error() {
    let stack = LiveStack::new();
    let id = submit(&stack, "DELETE", BASE, Some(json!({"name": "alice-router"}))).await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Value = extract_json_body(response).await;
    assert_eq!(envelope["error"], "No centos named alice-router found");
    assert!(stack.hypervisor.find_vm("alice", "alice-router").is_some());
}

#[tokio::test]
async fn test_delete_removes_vm() {
    let stack = LiveStack::new();
    let id = submit(&stack, "DELETE", BASE, Some(json!({"name": "alice-centos"}))).await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Value = extract_json_body(response).await;
    assert_eq!(envelope["error"], Value::Null);
    assert!(stack.hypervisor.find_vm("alice", "alice-centos").is_none());
}

#[tokio::test]
async fn test_image_lists_versions() {
    let stack = LiveStack::new();
    let id = submit(&stack, "GET", &format!("{}/image", BASE), None).await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let envelope: Value = extract_json_body(response).await;
    assert_eq!(envelope["content"], json!({"image": ["6", "7"]}));
}

#[tokio::test]
async fn test_modify_network_moves_vm() {
    let stack = LiveStack::new();
    stack.hypervisor.add_network("alice_backend");
    let id = submit(
        &stack,
        "PUT",
        &format!("{}/network", BASE),
        Some(json!({"name": "alice-centos", "new_network": "backend"})),
    )
    .await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let vm = stack.hypervisor.find_vm("alice", "alice-centos").unwrap();
    assert_eq!(vm.networks, vec!["alice_backend".to_string()]);
}

#[tokio::test]
async fn test_infrastructure_failure_returns_500() {
    let images = images_dir(&[]);
    let missing = images.path().join("gone");
    let stack = LiveStack::with_dir(fixture_hypervisor("alice"), missing, images);

    let id = submit(&stack, "GET", &format!("{}/image", BASE), None).await;

    let response = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = extract_json_body(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Task failed: "), "unexpected error: {}", error);
}

#[tokio::test]
async fn test_finished_task_status_is_kept() {
    let stack = LiveStack::new();
    let id = submit(&stack, "GET", BASE, None).await;

    wait_for_task(&stack.app, "alice", &id).await;

    assert!(matches!(
        stack.queue.task_status(&id),
        Some(TaskStatus::Success { .. })
    ));
    let again = wait_for_task(&stack.app, "alice", &id).await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unfinished_task_links_to_itself() {
    let stack = LiveStack::new();
    let id = submit(&stack, "GET", BASE, None).await;

    let request = Request::builder()
        .uri(format!("{}/task/{}", BASE, id))
        .header("x-user", "alice")
        .body(Body::empty())
        .unwrap();
    let response = stack.app.clone().oneshot(request).await.unwrap();

    // The worker may already have finished
    if response.status() == StatusCode::ACCEPTED {
        assert_eq!(
            response.headers()[header::LINK].to_str().unwrap(),
            expected_link(&id)
        );
        let body: Value = extract_json_body(response).await;
        assert_eq!(body["content"]["task-id"], json!(id));
        assert!(matches!(
            body["content"]["status"].as_str(),
            Some("pending") | Some("running")
        ));
    } else {
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_unknown_task_id_returns_404() {
    let stack = LiveStack::new();

    let response = wait_for_task(&stack.app, "alice", "no-such-task").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
