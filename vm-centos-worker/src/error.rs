use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// Bad input detected while talking to the hypervisor (unknown VM,
    /// network or image). Tasks report these in the result envelope.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Hypervisor error: {0}")]
    Hypervisor(#[from] anyhow::Error),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid arguments for task {task}: {reason}")]
    InvalidArguments { task: String, reason: String },

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Task queue is closed")]
    QueueClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        WorkerError::InvalidInput(msg.into())
    }
}
