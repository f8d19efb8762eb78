//! CentOS task dispatcher
//!
//! This crate holds the worker side of the CentOS service: the named tasks,
//! the business logic they run against a hypervisor, the result envelope they
//! return, and the queue that carries them. The vm-centos-api gateway only
//! submits tasks through [`TaskQueue`].

pub mod centos;
pub mod config;
pub mod envelope;
pub mod error;
pub mod hypervisor;
pub mod memory;
pub mod naming;
pub mod queue;
pub mod tasks;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{HypervisorConfig, WorkerConfig};
pub use envelope::ResultEnvelope;
pub use error::{Result, WorkerError};
pub use hypervisor::{Hypervisor, HypervisorSession, Session};
pub use memory::MemoryHypervisor;
pub use queue::{LocalTaskQueue, TaskHandle, TaskQueue, TaskStatus};
pub use tasks::{CentosDispatcher, CentosTask};
