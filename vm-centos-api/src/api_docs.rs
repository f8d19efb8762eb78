use crate::models::{
    CreateCentosRequest, DeleteCentosRequest, ModifyNetworkRequest, TaskAccepted, TaskContent,
};
use utoipa::OpenApi;
use vm_centos_worker::ResultEnvelope;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::centos::list_centos,
        crate::routes::centos::create_centos,
        crate::routes::centos::delete_centos,
        crate::routes::centos::list_images,
        crate::routes::centos::modify_network,
        crate::routes::tasks::task_status,
    ),
    components(
        schemas(
            CreateCentosRequest,
            DeleteCentosRequest,
            ModifyNetworkRequest,
            TaskAccepted,
            TaskContent,
            ResultEnvelope
        )
    ),
    tags(
        (name = "centos", description = "CentOS virtual machines"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
