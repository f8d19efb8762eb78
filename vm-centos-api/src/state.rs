use crate::config::Config;
use std::sync::Arc;
use vm_centos_worker::TaskQueue;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn TaskQueue>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(queue: Arc<dyn TaskQueue>, config: Config) -> Self {
        Self {
            queue,
            config: Arc::new(config),
        }
    }
}
