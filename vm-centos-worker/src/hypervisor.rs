//! Interface to the virtualization backend.
//!
//! The worker never talks to an SDK directly. Each task opens a [`Session`]
//! through a [`Hypervisor`] and the session is closed when the guard drops,
//! whether the task succeeded or not.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Value of `meta.component` for the VMs this service manages.
pub const CENTOS_COMPONENT: &str = "CentOS";

/// Tag distinguishing CentOS VMs from other VMs in a user's folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Component {
    CentOs,
    Other(String),
}

impl From<String> for Component {
    fn from(tag: String) -> Self {
        if tag == CENTOS_COMPONENT {
            Component::CentOs
        } else {
            Component::Other(tag)
        }
    }
}

impl From<Component> for String {
    fn from(component: Component) -> Self {
        match component {
            Component::CentOs => CENTOS_COMPONENT.to_string(),
            Component::Other(tag) => tag,
        }
    }
}

/// Metadata stamped on every VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmMeta {
    pub component: Component,
    #[serde(default)]
    pub created: f64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub generation: u32,
}

impl VmMeta {
    /// Metadata for a freshly deployed CentOS VM of `version`.
    pub fn centos(version: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            component: Component::CentOs,
            created: now.timestamp_millis() as f64 / 1000.0,
            version: version.to_string(),
            configured: false,
            generation: 1,
        }
    }

    pub fn is_centos(&self) -> bool {
        self.component == Component::CentOs
    }
}

/// Descriptive info about a VM, as reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmInfo {
    pub state: String,
    pub console: String,
    pub ips: Vec<String>,
    pub networks: Vec<String>,
    pub moid: String,
    pub meta: VmMeta,
}

/// Reference to a VM held by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub name: String,
    pub moid: String,
}

/// Reference to a network held by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRef {
    pub name: String,
    pub moid: String,
}

/// An OVA opened for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ova {
    pub path: PathBuf,
    /// Networks declared by the OVA descriptor, in order.
    pub networks: Vec<String>,
}

/// Maps a network declared by an OVA onto a hypervisor network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMapping {
    pub name: String,
    pub network: NetworkRef,
}

/// Handle to an asynchronous operation running inside the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTask {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

/// Opens sessions against a virtualization backend.
pub trait Hypervisor: Send + Sync {
    /// Name of the backend (e.g., "vcenter", "memory").
    fn name(&self) -> &'static str;

    fn connect(&self) -> anyhow::Result<Box<dyn HypervisorSession>>;
}

/// A connection to the backend, valid until [`HypervisorSession::close`].
pub trait HypervisorSession: Send {
    /// VMs in the folder owned by `username`.
    fn user_vms(&self, username: &str) -> anyhow::Result<Vec<VmRef>>;

    fn vm_info(&self, vm: &VmRef, username: &str, ensure_ip: bool) -> anyhow::Result<VmInfo>;

    /// Look up a network by name. `None` when it does not exist.
    fn network(&self, name: &str) -> anyhow::Result<Option<NetworkRef>>;

    /// Open the OVA at `path`. `None` when there is no such file.
    fn open_ova(&self, path: &Path) -> anyhow::Result<Option<Ova>>;

    /// Release resources held for an opened OVA.
    fn close_ova(&self, _ova: &Ova) {}

    /// Deploy a powered-off VM into the folder of `username`.
    fn deploy_from_ova(
        &self,
        ova: &Ova,
        mappings: &[NetworkMapping],
        username: &str,
        machine_name: &str,
    ) -> anyhow::Result<VmRef>;

    fn adjust_ram(&self, vm: &VmRef, mb_of_ram: u64) -> anyhow::Result<()>;

    fn adjust_cpu(&self, vm: &VmRef, cpu_count: u32) -> anyhow::Result<()>;

    fn power(&self, vm: &VmRef, state: PowerState) -> anyhow::Result<()>;

    fn set_meta(&self, vm: &VmRef, meta: &VmMeta) -> anyhow::Result<()>;

    /// Start destroying a VM. Completion is observed with [`HypervisorSession::wait_for`].
    fn destroy(&self, vm: &VmRef) -> anyhow::Result<BackendTask>;

    /// Block until `task` completes inside the backend.
    fn wait_for(&self, task: &BackendTask) -> anyhow::Result<()>;

    fn change_network(&self, vm: &VmRef, network: &NetworkRef) -> anyhow::Result<()>;

    fn close(&mut self);
}

/// Scoped hypervisor session, closed on drop.
pub struct Session {
    inner: Box<dyn HypervisorSession>,
}

impl Session {
    pub fn open(hypervisor: &dyn Hypervisor) -> anyhow::Result<Self> {
        let inner = hypervisor.connect()?;
        debug!("Opened {} session", hypervisor.name());
        Ok(Self { inner })
    }
}

impl Deref for Session {
    type Target = dyn HypervisorSession;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.close();
        debug!("Closed hypervisor session");
    }
}
