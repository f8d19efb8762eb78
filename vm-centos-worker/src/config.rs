use crate::queue::DEFAULT_RETAINED_RESULTS;
use serde::Deserialize;
use std::path::PathBuf;

/// Connection settings for the virtualization backend.
#[derive(Clone, Deserialize)]
pub struct HypervisorConfig {
    #[serde(default = "default_vcenter_host")]
    pub host: String,

    #[serde(default = "default_vcenter_user")]
    pub user: String,

    #[serde(default = "default_vcenter_password")]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Finished task statuses kept for polling before eviction.
    #[serde(default = "default_retained_results")]
    pub retained_results: usize,

    #[serde(default)]
    pub hypervisor: HypervisorConfig,
}

impl std::fmt::Debug for HypervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HypervisorConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_vcenter_host() -> String {
    std::env::var("VM_CENTOS_VCENTER_HOST").unwrap_or_else(|_| "localhost".to_string())
}

fn default_vcenter_user() -> String {
    std::env::var("VM_CENTOS_VCENTER_USER").unwrap_or_default()
}

fn default_vcenter_password() -> String {
    std::env::var("VM_CENTOS_VCENTER_PASSWORD").unwrap_or_default()
}

fn default_images_dir() -> PathBuf {
    std::env::var("VM_CENTOS_IMAGES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/images"))
}

fn default_worker_count() -> usize {
    std::env::var("VM_CENTOS_WORKERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(4)
}

fn default_retained_results() -> usize {
    std::env::var("VM_CENTOS_RETAINED_RESULTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_RETAINED_RESULTS)
}

impl Default for HypervisorConfig {
    fn default() -> Self {
        Self {
            host: default_vcenter_host(),
            user: default_vcenter_user(),
            password: default_vcenter_password(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            images_dir: default_images_dir(),
            worker_count: default_worker_count(),
            retained_results: default_retained_results(),
            hypervisor: HypervisorConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}
