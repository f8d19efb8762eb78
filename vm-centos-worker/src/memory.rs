//! In-process hypervisor.
//!
//! Keeps VMs and networks in memory. OVA files are still read from disk so
//! image resolution behaves the same as against a real backend.

use crate::hypervisor::{
    BackendTask, Component, Hypervisor, HypervisorSession, NetworkMapping, NetworkRef, Ova,
    PowerState, VmInfo, VmMeta, VmRef,
};
use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Network declared by every OVA this backend opens.
pub const DEFAULT_OVA_NETWORK: &str = "VM Network";

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryVm {
    pub vm: VmRef,
    pub owner: String,
    pub ram_mb: u64,
    pub cpu_count: u32,
    pub power: PowerState,
    pub networks: Vec<String>,
    pub ips: Vec<String>,
    pub meta: VmMeta,
}

#[derive(Debug, Default)]
struct MemoryState {
    vms: Vec<MemoryVm>,
    networks: HashMap<String, NetworkRef>,
    pending_destroys: HashMap<String, String>,
    open_sessions: usize,
    open_ovas: usize,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn vm(&self, vm: &VmRef) -> Result<&MemoryVm> {
        self.vms
            .iter()
            .find(|v| v.vm.moid == vm.moid)
            .ok_or_else(|| anyhow!("managed object {} does not exist", vm.moid))
    }

    fn vm_mut(&mut self, vm: &VmRef) -> Result<&mut MemoryVm> {
        self.vms
            .iter_mut()
            .find(|v| v.vm.moid == vm.moid)
            .ok_or_else(|| anyhow!("managed object {} does not exist", vm.moid))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHypervisor {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&self, name: &str) -> NetworkRef {
        let mut state = self.state();
        let network = NetworkRef {
            name: name.to_string(),
            moid: state.next_id("network"),
        };
        state.networks.insert(name.to_string(), network.clone());
        network
    }

    /// Register an existing, powered-on VM owned by `username`.
    pub fn add_vm(&self, username: &str, machine_name: &str, meta: VmMeta) -> VmRef {
        let mut state = self.state();
        let vm = VmRef {
            name: machine_name.to_string(),
            moid: state.next_id("vm"),
        };
        state.vms.push(MemoryVm {
            vm: vm.clone(),
            owner: username.to_string(),
            ram_mb: 4096,
            cpu_count: 4,
            power: PowerState::On,
            networks: Vec::new(),
            ips: Vec::new(),
            meta,
        });
        vm
    }

    pub fn find_vm(&self, username: &str, machine_name: &str) -> Option<MemoryVm> {
        self.state()
            .vms
            .iter()
            .find(|v| v.owner == username && v.vm.name == machine_name)
            .cloned()
    }

    /// Number of sessions connected and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.state().open_sessions
    }

    /// Number of OVAs opened and not yet closed.
    pub fn open_ovas(&self) -> usize {
        self.state().open_ovas
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Hypervisor for MemoryHypervisor {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn connect(&self) -> Result<Box<dyn HypervisorSession>> {
        self.state().open_sessions += 1;
        Ok(Box::new(MemorySession {
            hypervisor: self.clone(),
            closed: false,
        }))
    }
}

struct MemorySession {
    hypervisor: MemoryHypervisor,
    closed: bool,
}

impl MemorySession {
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        if self.closed {
            bail!("session is closed");
        }
        Ok(self.hypervisor.state())
    }
}

impl HypervisorSession for MemorySession {
    fn user_vms(&self, username: &str) -> Result<Vec<VmRef>> {
        Ok(self
            .state()?
            .vms
            .iter()
            .filter(|v| v.owner == username)
            .map(|v| v.vm.clone())
            .collect())
    }

    fn vm_info(&self, vm: &VmRef, _username: &str, _ensure_ip: bool) -> Result<VmInfo> {
        let state = self.state()?;
        let vm = state.vm(vm)?;
        let power_state = match vm.power {
            PowerState::On => "poweredOn",
            PowerState::Off => "poweredOff",
        };

        Ok(VmInfo {
            state: power_state.to_string(),
            console: format!("https://localhost/ui/webconsole.html?vmId={}", vm.vm.moid),
            ips: vm.ips.clone(),
            networks: vm.networks.clone(),
            moid: vm.vm.moid.clone(),
            meta: vm.meta.clone(),
        })
    }

    fn network(&self, name: &str) -> Result<Option<NetworkRef>> {
        Ok(self.state()?.networks.get(name).cloned())
    }

    fn open_ova(&self, path: &Path) -> Result<Option<Ova>> {
        let mut state = self.state()?;
        if !path.is_file() {
            return Ok(None);
        }

        state.open_ovas += 1;
        Ok(Some(Ova {
            path: path.to_path_buf(),
            networks: vec![DEFAULT_OVA_NETWORK.to_string()],
        }))
    }

    fn close_ova(&self, ova: &Ova) {
        debug!("Closing {}", ova.path.display());
        let mut state = self.hypervisor.state();
        state.open_ovas = state.open_ovas.saturating_sub(1);
    }

    fn deploy_from_ova(
        &self,
        ova: &Ova,
        mappings: &[NetworkMapping],
        username: &str,
        machine_name: &str,
    ) -> Result<VmRef> {
        let mut state = self.state()?;
        if state
            .vms
            .iter()
            .any(|v| v.owner == username && v.vm.name == machine_name)
        {
            bail!("The name '{}' already exists", machine_name);
        }

        let vm = VmRef {
            name: machine_name.to_string(),
            moid: state.next_id("vm"),
        };
        debug!("Deploying {} from {}", vm.moid, ova.path.display());
        state.vms.push(MemoryVm {
            vm: vm.clone(),
            owner: username.to_string(),
            ram_mb: 1024,
            cpu_count: 1,
            power: PowerState::Off,
            networks: mappings.iter().map(|m| m.network.name.clone()).collect(),
            ips: Vec::new(),
            meta: VmMeta {
                component: Component::Other(String::new()),
                created: 0.0,
                version: String::new(),
                configured: false,
                generation: 0,
            },
        });

        Ok(vm)
    }

    fn adjust_ram(&self, vm: &VmRef, mb_of_ram: u64) -> Result<()> {
        self.state()?.vm_mut(vm)?.ram_mb = mb_of_ram;
        Ok(())
    }

    fn adjust_cpu(&self, vm: &VmRef, cpu_count: u32) -> Result<()> {
        self.state()?.vm_mut(vm)?.cpu_count = cpu_count;
        Ok(())
    }

    fn power(&self, vm: &VmRef, power: PowerState) -> Result<()> {
        let mut state = self.state()?;
        let host = state.vms.len();
        let vm = state.vm_mut(vm)?;
        vm.power = power;
        vm.ips = match power {
            PowerState::On => vec![format!("10.0.0.{}", host % 254 + 1)],
            PowerState::Off => Vec::new(),
        };
        Ok(())
    }

    fn set_meta(&self, vm: &VmRef, meta: &VmMeta) -> Result<()> {
        self.state()?.vm_mut(vm)?.meta = meta.clone();
        Ok(())
    }

    fn destroy(&self, vm: &VmRef) -> Result<BackendTask> {
        let mut state = self.state()?;
        state.vm(vm)?;
        let id = state.next_id("task");
        state.pending_destroys.insert(id.clone(), vm.moid.clone());
        Ok(BackendTask { id })
    }

    fn wait_for(&self, task: &BackendTask) -> Result<()> {
        let mut state = self.state()?;
        let moid = state
            .pending_destroys
            .remove(&task.id)
            .ok_or_else(|| anyhow!("unknown backend task {}", task.id))?;
        state.vms.retain(|v| v.vm.moid != moid);
        Ok(())
    }

    fn change_network(&self, vm: &VmRef, network: &NetworkRef) -> Result<()> {
        self.state()?.vm_mut(vm)?.networks = vec![network.name.clone()];
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.hypervisor.state();
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::Session;

    #[test]
    fn test_session_guard_closes_on_drop() {
        let hypervisor = MemoryHypervisor::new();
        {
            let _session = Session::open(&hypervisor).unwrap();
            assert_eq!(hypervisor.open_sessions(), 1);
        }
        assert_eq!(hypervisor.open_sessions(), 0);
    }

    #[test]
    fn test_ova_count_tracks_open_and_close() {
        let hypervisor = MemoryHypervisor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("CentOS-7.ova");
        std::fs::write(&path, b"").unwrap();
        let session = Session::open(&hypervisor).unwrap();

        assert!(session.open_ova(&dir.path().join("CentOS-5.ova")).unwrap().is_none());
        assert_eq!(hypervisor.open_ovas(), 0);

        let ova = session.open_ova(&path).unwrap().unwrap();
        assert_eq!(hypervisor.open_ovas(), 1);

        session.close_ova(&ova);
        assert_eq!(hypervisor.open_ovas(), 0);
    }

    #[test]
    fn test_destroy_completes_on_wait() {
        let hypervisor = MemoryHypervisor::new();
        let vm = hypervisor.add_vm("alice", "web01", VmMeta::centos("7"));
        let session = Session::open(&hypervisor).unwrap();

        let task = session.destroy(&vm).unwrap();
        assert!(hypervisor.find_vm("alice", "web01").is_some());

        session.wait_for(&task).unwrap();
        assert!(hypervisor.find_vm("alice", "web01").is_none());
    }

    #[test]
    fn test_user_vms_are_scoped_to_owner() {
        let hypervisor = MemoryHypervisor::new();
        hypervisor.add_vm("alice", "web01", VmMeta::centos("7"));
        hypervisor.add_vm("bob", "db01", VmMeta::centos("7"));
        let session = Session::open(&hypervisor).unwrap();

        let vms = session.user_vms("alice").unwrap();
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].name, "web01");
    }
}
