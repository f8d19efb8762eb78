//! Fixtures shared by this crate's tests and the gateway's tests.

use crate::error::{Result, WorkerError};
use crate::hypervisor::VmMeta;
use crate::memory::MemoryHypervisor;
use crate::queue::{TaskHandle, TaskQueue, TaskStatus};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;

/// A task call captured by [`RecordingQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentTask {
    pub id: String,
    pub name: String,
    pub args: Vec<Value>,
}

/// Queue that records submissions instead of running them.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<SentTask>>,
    closed: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that rejects every submission.
    pub fn closed() -> Self {
        Self {
            sent: Mutex::default(),
            closed: true,
        }
    }

    pub fn sent(&self) -> Vec<SentTask> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TaskQueue for RecordingQueue {
    fn send_task(&self, name: &str, args: Vec<Value>) -> Result<TaskHandle> {
        if self.closed {
            return Err(WorkerError::QueueClosed);
        }

        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        let id = format!("task-{}", sent.len() + 1);
        sent.push(SentTask {
            id: id.clone(),
            name: name.to_string(),
            args,
        });

        Ok(TaskHandle { id })
    }

    fn task_status(&self, id: &str) -> Option<TaskStatus> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|t| t.id == id)
            .then_some(TaskStatus::Pending)
    }
}

/// Temporary images directory containing empty files named `files`.
pub fn images_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create images dir");
    for file in files {
        std::fs::write(dir.path().join(file), b"").expect("Failed to create image file");
    }
    dir
}

/// Hypervisor with a `{username}_frontend` network and one CentOS VM
/// (`{username}-centos`) plus one non-CentOS VM (`{username}-router`).
pub fn fixture_hypervisor(username: &str) -> MemoryHypervisor {
    let hypervisor = MemoryHypervisor::new();
    hypervisor.add_network(&format!("{}_frontend", username));
    hypervisor.add_vm(
        username,
        &format!("{}-centos", username),
        VmMeta::centos("7"),
    );

    let mut router = VmMeta::centos("1.0");
    router.component = crate::hypervisor::Component::Other("Router".to_string());
    hypervisor.add_vm(username, &format!("{}-router", username), router);

    hypervisor
}
