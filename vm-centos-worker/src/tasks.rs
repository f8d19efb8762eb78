//! Named task entry points.
//!
//! A task arrives as a name plus positional JSON arguments. It is decoded into
//! a [`CentosTask`] and run by the [`CentosDispatcher`], which turns domain
//! errors into a [`ResultEnvelope`] and lets every other error propagate.

use crate::centos::{self, CreateCentos};
use crate::envelope::{to_content, ResultEnvelope};
use crate::error::{Result, WorkerError};
use crate::hypervisor::Hypervisor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span};

pub const SHOW: &str = "centos.show";
pub const CREATE: &str = "centos.create";
pub const DELETE: &str = "centos.delete";
pub const IMAGE: &str = "centos.image";
pub const MODIFY_NETWORK: &str = "centos.modify_network";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentosTask {
    Show {
        username: String,
        txn_id: String,
    },
    Create {
        params: CreateCentos,
        txn_id: String,
    },
    Delete {
        username: String,
        machine_name: String,
        txn_id: String,
    },
    Image {
        txn_id: String,
    },
    ModifyNetwork {
        username: String,
        machine_name: String,
        new_network: String,
        txn_id: String,
    },
}

impl CentosTask {
    pub fn name(&self) -> &'static str {
        match self {
            CentosTask::Show { .. } => SHOW,
            CentosTask::Create { .. } => CREATE,
            CentosTask::Delete { .. } => DELETE,
            CentosTask::Image { .. } => IMAGE,
            CentosTask::ModifyNetwork { .. } => MODIFY_NETWORK,
        }
    }

    pub fn txn_id(&self) -> &str {
        match self {
            CentosTask::Show { txn_id, .. }
            | CentosTask::Create { txn_id, .. }
            | CentosTask::Delete { txn_id, .. }
            | CentosTask::Image { txn_id }
            | CentosTask::ModifyNetwork { txn_id, .. } => txn_id,
        }
    }

    /// Positional arguments, in the order the task signature declares them.
    pub fn args(&self) -> Vec<Value> {
        match self {
            CentosTask::Show { username, txn_id } => vec![json!(username), json!(txn_id)],
            CentosTask::Create { params, txn_id } => vec![
                json!(params.username),
                json!(params.machine_name),
                json!(params.image),
                json!(params.network),
                json!(params.desktop),
                json!(params.ram),
                json!(params.cpu_count),
                json!(txn_id),
            ],
            CentosTask::Delete {
                username,
                machine_name,
                txn_id,
            } => vec![json!(username), json!(machine_name), json!(txn_id)],
            CentosTask::Image { txn_id } => vec![json!(txn_id)],
            CentosTask::ModifyNetwork {
                username,
                machine_name,
                new_network,
                txn_id,
            } => vec![
                json!(username),
                json!(machine_name),
                json!(new_network),
                json!(txn_id),
            ],
        }
    }

    /// Decode a task call received from the queue.
    pub fn from_call(name: &str, args: &[Value]) -> Result<Self> {
        match name {
            SHOW => {
                let (username, txn_id) = decode_args(name, args)?;
                Ok(CentosTask::Show { username, txn_id })
            }
            CREATE => {
                let (username, machine_name, image, network, desktop, ram, cpu_count, txn_id) =
                    decode_args(name, args)?;
                Ok(CentosTask::Create {
                    params: CreateCentos {
                        username,
                        machine_name,
                        image,
                        network,
                        desktop,
                        ram,
                        cpu_count,
                    },
                    txn_id,
                })
            }
            DELETE => {
                let (username, machine_name, txn_id) = decode_args(name, args)?;
                Ok(CentosTask::Delete {
                    username,
                    machine_name,
                    txn_id,
                })
            }
            IMAGE => {
                let (txn_id,) = decode_args(name, args)?;
                Ok(CentosTask::Image { txn_id })
            }
            MODIFY_NETWORK => {
                let (username, machine_name, new_network, txn_id) = decode_args(name, args)?;
                Ok(CentosTask::ModifyNetwork {
                    username,
                    machine_name,
                    new_network,
                    txn_id,
                })
            }
            other => Err(WorkerError::UnknownTask(other.to_string())),
        }
    }
}

fn decode_args<T: DeserializeOwned>(task: &str, args: &[Value]) -> Result<T> {
    serde_json::from_value(Value::Array(args.to_vec())).map_err(|e| {
        WorkerError::InvalidArguments {
            task: task.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Runs CentOS tasks against a hypervisor.
#[derive(Clone)]
pub struct CentosDispatcher {
    hypervisor: Arc<dyn Hypervisor>,
    images_dir: PathBuf,
}

impl CentosDispatcher {
    pub fn new(hypervisor: Arc<dyn Hypervisor>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            hypervisor,
            images_dir: images_dir.into(),
        }
    }

    /// Run `task` to completion on the blocking pool.
    ///
    /// Logs emitted while the task runs carry its name, id and txn_id.
    pub async fn dispatch(&self, task_id: &str, task: CentosTask) -> Result<ResultEnvelope> {
        let span = info_span!("task", task = task.name(), task_id = %task_id, txn_id = %task.txn_id());
        let dispatcher = self.clone();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            dispatcher.run(task)
        })
        .await
        .map_err(|e| WorkerError::TaskPanicked(e.to_string()))?
    }

    /// Run `task` on the current thread.
    pub fn run(&self, task: CentosTask) -> Result<ResultEnvelope> {
        match task {
            CentosTask::Show { username, .. } => self.show(&username),
            CentosTask::Create { params, .. } => self.create(&params),
            CentosTask::Delete {
                username,
                machine_name,
                ..
            } => self.delete(&username, &machine_name),
            CentosTask::Image { .. } => self.image(),
            CentosTask::ModifyNetwork {
                username,
                machine_name,
                new_network,
                ..
            } => self.modify_network(&username, &machine_name, &new_network),
        }
    }

    pub fn show(&self, username: &str) -> Result<ResultEnvelope> {
        info!("Task starting");
        normalize(centos::show_centos(self.hypervisor.as_ref(), username))
    }

    pub fn create(&self, params: &CreateCentos) -> Result<ResultEnvelope> {
        info!("Task starting");
        normalize(centos::create_centos(
            self.hypervisor.as_ref(),
            &self.images_dir,
            params,
        ))
    }

    pub fn delete(&self, username: &str, machine_name: &str) -> Result<ResultEnvelope> {
        info!("Task starting");
        normalize(centos::delete_centos(
            self.hypervisor.as_ref(),
            username,
            machine_name,
        ))
    }

    pub fn image(&self) -> Result<ResultEnvelope> {
        info!("Task starting");
        let images = centos::list_images(&self.images_dir)?;
        info!("Task complete");
        Ok(ResultEnvelope::with_content(to_content(
            &json!({ "image": images }),
        )?))
    }

    pub fn modify_network(
        &self,
        username: &str,
        machine_name: &str,
        new_network: &str,
    ) -> Result<ResultEnvelope> {
        info!("Task starting");
        normalize(centos::update_network(
            self.hypervisor.as_ref(),
            username,
            machine_name,
            new_network,
        ))
    }
}

/// Domain errors become the envelope `error`; anything else is returned.
fn normalize<T: Serialize>(outcome: Result<T>) -> Result<ResultEnvelope> {
    match outcome {
        Ok(content) => {
            info!("Task complete");
            Ok(ResultEnvelope::with_content(to_content(&content)?))
        }
        Err(WorkerError::InvalidInput(msg)) => {
            error!("Task failed: {}", msg);
            Ok(ResultEnvelope::failure(msg))
        }
        Err(e) => Err(e),
    }
}
