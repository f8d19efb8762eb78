//! Business logic behind the CentOS tasks.
//!
//! Every function opens its own hypervisor session and returns
//! [`WorkerError::InvalidInput`] for bad names, networks or images.

use crate::error::{Result, WorkerError};
use crate::hypervisor::{
    Hypervisor, NetworkMapping, Ova, PowerState, Session, VmInfo, VmMeta, VmRef,
};
use crate::naming::{image_file_name, image_version};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Parameters for deploying a new CentOS VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCentos {
    pub username: String,
    pub machine_name: String,
    pub image: String,
    pub network: String,
    pub desktop: bool,
    pub ram: u32,
    pub cpu_count: u32,
}

/// CentOS VMs owned by `username`, keyed by VM name.
pub fn show_centos(hypervisor: &dyn Hypervisor, username: &str) -> Result<BTreeMap<String, VmInfo>> {
    let session = Session::open(hypervisor)?;
    let mut centos_vms = BTreeMap::new();

    for vm in session.user_vms(username)? {
        let info = session.vm_info(&vm, username, false)?;
        if info.meta.is_centos() {
            centos_vms.insert(vm.name, info);
        }
    }

    Ok(centos_vms)
}

/// Deploy, size, power on and tag a new CentOS VM.
pub fn create_centos(
    hypervisor: &dyn Hypervisor,
    images_dir: &Path,
    req: &CreateCentos,
) -> Result<BTreeMap<String, VmInfo>> {
    let session = Session::open(hypervisor)?;

    let image_name = image_file_name(&req.image, req.desktop);
    info!("{}", image_name);
    let ova = session
        .open_ova(&images_dir.join(&image_name))?
        .ok_or_else(|| {
            WorkerError::invalid_input(format!(
                "Invalid version of CentOS supplied: {}",
                req.image
            ))
        })?;

    let deployed = deploy(&session, &ova, req);
    session.close_ova(&ova);
    let vm = deployed?;

    session.adjust_ram(&vm, u64::from(req.ram) * 1024)?;
    session.adjust_cpu(&vm, req.cpu_count)?;
    session.power(&vm, PowerState::On)?;
    session.set_meta(&vm, &VmMeta::centos(&req.image))?;

    let info = session.vm_info(&vm, &req.username, true)?;
    Ok(BTreeMap::from([(vm.name, info)]))
}

fn deploy(session: &Session, ova: &Ova, req: &CreateCentos) -> Result<VmRef> {
    let network = session.network(&req.network)?.ok_or_else(|| {
        WorkerError::invalid_input(format!("No such network named {}", req.network))
    })?;
    let ova_network = ova.networks.first().cloned().ok_or_else(|| {
        WorkerError::Hypervisor(anyhow::anyhow!(
            "OVA {} declares no networks",
            ova.path.display()
        ))
    })?;
    let mapping = NetworkMapping {
        name: ova_network,
        network,
    };

    Ok(session.deploy_from_ova(ova, &[mapping], &req.username, &req.machine_name)?)
}

/// Power off and destroy a user's CentOS VM, blocking until it is gone.
pub fn delete_centos(hypervisor: &dyn Hypervisor, username: &str, machine_name: &str) -> Result<()> {
    let session = Session::open(hypervisor)?;
    let vm = find_centos(&session, username, machine_name)?.ok_or_else(|| {
        WorkerError::invalid_input(format!("No centos named {} found", machine_name))
    })?;

    debug!("powering off VM");
    session.power(&vm, PowerState::Off)?;
    let delete_task = session.destroy(&vm)?;
    debug!("blocking while VM is being destroyed");
    session.wait_for(&delete_task)?;

    Ok(())
}

/// Versions of CentOS available in `images_dir`.
pub fn list_images(images_dir: &Path) -> Result<Vec<String>> {
    let mut versions = BTreeSet::new();

    for entry in std::fs::read_dir(images_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_str().is_none() {
            debug!("Image name is not valid UTF-8: {:?}", file_name);
        }
        versions.insert(image_version(&file_name.to_string_lossy()));
    }

    Ok(versions.into_iter().collect())
}

/// Attach a user's CentOS VM to a different network.
pub fn update_network(
    hypervisor: &dyn Hypervisor,
    username: &str,
    machine_name: &str,
    new_network: &str,
) -> Result<()> {
    let session = Session::open(hypervisor)?;
    let vm = find_centos(&session, username, machine_name)?.ok_or_else(|| {
        WorkerError::invalid_input(format!("No VM named {} found", machine_name))
    })?;
    let network = session.network(new_network)?.ok_or_else(|| {
        WorkerError::invalid_input(format!("No such network named {}", new_network))
    })?;

    session.change_network(&vm, &network)?;
    Ok(())
}

/// The user's CentOS VM named `machine_name`, if there is one.
fn find_centos(session: &Session, username: &str, machine_name: &str) -> Result<Option<VmRef>> {
    for vm in session.user_vms(username)? {
        if vm.name == machine_name && session.vm_info(&vm, username, false)?.meta.is_centos() {
            return Ok(Some(vm));
        }
    }

    Ok(None)
}
