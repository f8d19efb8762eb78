use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vm_centos_api::{create_app, AppState, Config};
use vm_centos_worker::{CentosDispatcher, Hypervisor, LocalTaskQueue, MemoryHypervisor, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let worker_config = WorkerConfig::from_env();

    // Initialize tracing; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vm_centos_api={0},vm_centos_worker={0},tower_http={0}",
            config.log_level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting vm-centos-api service...");
    info!(
        "Configuration loaded: bind_addr={}, url={}, verify_token={}",
        config.bind_addr, config.url, config.verify_token
    );
    info!("Images directory: {}", worker_config.images_dir.display());

    let hypervisor = MemoryHypervisor::new();
    warn!(
        "No vCenter client linked; using the {} hypervisor ({:?})",
        hypervisor.name(),
        worker_config.hypervisor
    );

    // Start the worker pool
    let dispatcher = CentosDispatcher::new(Arc::new(hypervisor), &worker_config.images_dir);
    let queue = LocalTaskQueue::spawn_with_retention(
        dispatcher,
        worker_config.worker_count,
        worker_config.retained_results,
    );
    info!(
        "Task queue started ({} workers)",
        worker_config.worker_count
    );

    let app = create_app(AppState::new(Arc::new(queue), config.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
