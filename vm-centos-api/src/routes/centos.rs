use crate::{
    auth::AuthenticatedUser,
    error::ApiResult,
    models::{
        CreateCentosRequest, DeleteCentosRequest, ModifyNetworkRequest, TaskAccepted,
        TaskContent,
    },
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Extension, Json, Router,
};
use tracing::info;
use vm_centos_worker::{centos::CreateCentos, CentosTask};

pub const ROUTE_BASE: &str = "/api/2/inf/centos";

/// Correlation id header threaded through task logs.
pub const TXN_ID_HEADER: &str = "x-request-id";
pub const DEFAULT_TXN_ID: &str = "noId";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            ROUTE_BASE,
            get(list_centos).post(create_centos).delete(delete_centos),
        )
        .route(&format!("{}/image", ROUTE_BASE), get(list_images))
        .route(&format!("{}/network", ROUTE_BASE), put(modify_network))
}

/// Display the CentOS instances you own
#[utoipa::path(
    get,
    path = "/api/2/inf/centos",
    responses((status = 202, description = "Task submitted", body = TaskAccepted)),
    tag = "centos"
)]
pub async fn list_centos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let task = CentosTask::Show {
        username: user.username.clone(),
        txn_id: txn_id(&headers),
    };

    submit(&state, &user, task)
}

/// Create a CentOS
#[utoipa::path(
    post,
    path = "/api/2/inf/centos",
    request_body = CreateCentosRequest,
    responses(
        (status = 202, description = "Task submitted", body = TaskAccepted),
        (status = 400, description = "Request body failed validation")
    ),
    tag = "centos"
)]
pub async fn create_centos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Result<Json<CreateCentosRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;

    // Networks are always scoped to the requesting user
    let network = format!("{}_{}", user.username, req.network);
    let task = CentosTask::Create {
        params: CreateCentos {
            username: user.username.clone(),
            machine_name: req.name,
            image: req.image,
            network,
            desktop: req.desktop,
            ram: req.ram.into(),
            cpu_count: req.cpu_count.into(),
        },
        txn_id: txn_id(&headers),
    };

    submit(&state, &user, task)
}

/// Destroy a CentOS
#[utoipa::path(
    delete,
    path = "/api/2/inf/centos",
    request_body = DeleteCentosRequest,
    responses(
        (status = 202, description = "Task submitted", body = TaskAccepted),
        (status = 400, description = "Request body failed validation")
    ),
    tag = "centos"
)]
pub async fn delete_centos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Result<Json<DeleteCentosRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let task = CentosTask::Delete {
        username: user.username.clone(),
        machine_name: req.name,
        txn_id: txn_id(&headers),
    };

    submit(&state, &user, task)
}

/// Show available versions of CentOS that can be deployed
#[utoipa::path(
    get,
    path = "/api/2/inf/centos/image",
    responses((status = 202, description = "Task submitted", body = TaskAccepted)),
    tag = "centos"
)]
pub async fn list_images(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let task = CentosTask::Image {
        txn_id: txn_id(&headers),
    };

    submit(&state, &user, task)
}

/// Connect a CentOS to a different network
#[utoipa::path(
    put,
    path = "/api/2/inf/centos/network",
    request_body = ModifyNetworkRequest,
    responses(
        (status = 202, description = "Task submitted", body = TaskAccepted),
        (status = 400, description = "Request body failed validation")
    ),
    tag = "centos"
)]
pub async fn modify_network(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Result<Json<ModifyNetworkRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let new_network = format!("{}_{}", user.username, req.new_network);
    let task = CentosTask::ModifyNetwork {
        username: user.username.clone(),
        machine_name: req.name,
        new_network,
        txn_id: txn_id(&headers),
    };

    submit(&state, &user, task)
}

fn txn_id(headers: &HeaderMap) -> String {
    headers
        .get(TXN_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(DEFAULT_TXN_ID)
        .to_string()
}

fn submit(state: &AppState, user: &AuthenticatedUser, task: CentosTask) -> ApiResult<Response> {
    let handle = state.queue.send_task(task.name(), task.args())?;
    info!(
        txn_id = task.txn_id(),
        "Submitted {} for {} as {}",
        task.name(),
        user.username,
        handle.id
    );

    let body = TaskAccepted {
        user: Some(user.username.clone()),
        content: TaskContent {
            task_id: handle.id.clone(),
            status: None,
        },
    };

    Ok((
        StatusCode::ACCEPTED,
        [(header::LINK, status_link(state, &handle.id))],
        Json(body),
    )
        .into_response())
}

/// `Link` header value pointing at the status of task `id`.
pub fn status_link(state: &AppState, id: &str) -> String {
    format!("<{}{}/task/{}>; rel=status", state.config.url, ROUTE_BASE, id)
}
