use crate::{
    error::{ApiError, ApiResult},
    models::{TaskAccepted, TaskContent},
    routes::centos::{status_link, ROUTE_BASE},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use vm_centos_worker::{ResultEnvelope, TaskStatus};

pub fn routes() -> Router<AppState> {
    Router::new().route(&format!("{}/task/{{id}}", ROUTE_BASE), get(task_status))
}

/// Check the status of a submitted task
#[utoipa::path(
    get,
    path = "/api/2/inf/centos/task/{id}",
    params(("id" = String, Path, description = "Task id returned on submission")),
    responses(
        (status = 200, description = "Task finished", body = ResultEnvelope),
        (status = 202, description = "Task still queued or running", body = TaskAccepted),
        (status = 404, description = "No such task"),
        (status = 500, description = "Task failed")
    ),
    tag = "centos"
)]
pub async fn task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let status = state
        .queue
        .task_status(&id)
        .ok_or_else(|| ApiError::NotFound(format!("No such task: {}", id)))?;

    match status {
        TaskStatus::Success { result } => Ok((StatusCode::OK, Json(result)).into_response()),
        TaskStatus::Failed { error } => Err(ApiError::Internal(format!("Task failed: {}", error))),
        pending => {
            let body = TaskAccepted {
                user: None,
                content: TaskContent {
                    task_id: id.clone(),
                    status: Some(pending.label().to_string()),
                },
            };

            Ok((
                StatusCode::ACCEPTED,
                [(header::LINK, status_link(&state, &id))],
                Json(body),
            )
                .into_response())
        }
    }
}
