//! Task submission and an in-process worker pool.
//!
//! Producers only see the [`TaskQueue`] trait: submit a task by name with
//! positional arguments and get back a [`TaskHandle`]. [`LocalTaskQueue`]
//! runs the tasks on the tokio runtime, at most `worker_count` at a time, and
//! keeps each task's [`TaskStatus`] in memory. Only the most recent finished
//! statuses are retained; older ones are evicted and read back as unknown.

use crate::envelope::ResultEnvelope;
use crate::error::{Result, WorkerError};
use crate::tasks::{CentosDispatcher, CentosTask};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};
use utoipa::ToSchema;
use uuid::Uuid;

/// Finished statuses kept by [`LocalTaskQueue::spawn`].
pub const DEFAULT_RETAINED_RESULTS: usize = 1000;

/// Handle returned on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskHandle {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success { result: ResultEnvelope },
    Failed { error: String },
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Success { .. } | TaskStatus::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success { .. } => "success",
            TaskStatus::Failed { .. } => "failed",
        }
    }
}

/// Submits named tasks for asynchronous execution.
pub trait TaskQueue: Send + Sync {
    fn send_task(&self, name: &str, args: Vec<Value>) -> Result<TaskHandle>;

    /// Status of a submitted task. `None` for ids this queue never issued.
    fn task_status(&self, id: &str) -> Option<TaskStatus>;
}

#[derive(Debug)]
struct QueuedTask {
    id: String,
    name: String,
    args: Vec<Value>,
}

/// Task statuses plus the completion order used for eviction.
#[derive(Debug)]
struct StatusStore {
    statuses: HashMap<String, TaskStatus>,
    finished: VecDeque<String>,
    retained: usize,
}

impl StatusStore {
    fn new(retained: usize) -> Self {
        Self {
            statuses: HashMap::new(),
            finished: VecDeque::new(),
            retained,
        }
    }

    fn set(&mut self, id: &str, status: TaskStatus) {
        let finished = status.is_finished();
        self.statuses.insert(id.to_string(), status);

        if finished {
            self.finished.push_back(id.to_string());
            while self.finished.len() > self.retained {
                if let Some(oldest) = self.finished.pop_front() {
                    debug!("Evicting status of {}", oldest);
                    self.statuses.remove(&oldest);
                }
            }
        }
    }
}

type StatusMap = Arc<RwLock<StatusStore>>;

#[derive(Clone)]
pub struct LocalTaskQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    statuses: StatusMap,
}

impl LocalTaskQueue {
    /// Start the queue on the current tokio runtime.
    pub fn spawn(dispatcher: CentosDispatcher, worker_count: usize) -> Self {
        Self::spawn_with_retention(dispatcher, worker_count, DEFAULT_RETAINED_RESULTS)
    }

    /// Start the queue, keeping at most `retained` finished statuses.
    pub fn spawn_with_retention(
        dispatcher: CentosDispatcher,
        worker_count: usize,
        retained: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let statuses = Arc::new(RwLock::new(StatusStore::new(retained.max(1))));

        tokio::spawn(run_queue(
            dispatcher,
            receiver,
            statuses.clone(),
            worker_count.max(1),
        ));

        Self { sender, statuses }
    }

    fn set_status(statuses: &StatusMap, id: &str, status: TaskStatus) {
        statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(id, status);
    }
}

impl TaskQueue for LocalTaskQueue {
    fn send_task(&self, name: &str, args: Vec<Value>) -> Result<TaskHandle> {
        let id = Uuid::new_v4().to_string();
        Self::set_status(&self.statuses, &id, TaskStatus::Pending);

        let queued = QueuedTask {
            id: id.clone(),
            name: name.to_string(),
            args,
        };
        if self.sender.send(queued).is_err() {
            self.statuses
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .statuses
                .remove(&id);
            return Err(WorkerError::QueueClosed);
        }

        debug!("Queued {} as {}", name, id);
        Ok(TaskHandle { id })
    }

    fn task_status(&self, id: &str) -> Option<TaskStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .statuses
            .get(id)
            .cloned()
    }
}

async fn run_queue(
    dispatcher: CentosDispatcher,
    mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
    statuses: StatusMap,
    worker_count: usize,
) {
    let permits = Arc::new(Semaphore::new(worker_count));
    info!("Task queue running ({} workers)", worker_count);

    while let Some(task) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let dispatcher = dispatcher.clone();
        let statuses = statuses.clone();

        tokio::spawn(async move {
            let _permit = permit;
            execute(&dispatcher, &statuses, task).await;
        });
    }

    info!("Task queue stopped");
}

async fn execute(dispatcher: &CentosDispatcher, statuses: &StatusMap, task: QueuedTask) {
    LocalTaskQueue::set_status(statuses, &task.id, TaskStatus::Running);

    let outcome = match CentosTask::from_call(&task.name, &task.args) {
        Ok(call) => dispatcher.dispatch(&task.id, call).await,
        Err(e) => Err(e),
    };

    let status = match outcome {
        Ok(result) => TaskStatus::Success { result },
        Err(e) => {
            error!(task_id = %task.id, "Task {} failed: {}", task.name, e);
            TaskStatus::Failed {
                error: e.to_string(),
            }
        }
    };
    LocalTaskQueue::set_status(statuses, &task.id, status);
}
