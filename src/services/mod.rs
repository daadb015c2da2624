//! Collaborator clients and the orchestration kernel

pub mod compute;
pub mod orchestrator;
pub mod storage;

pub use compute::{ComputeBackend, ComputeError, RunpodClient};
pub use orchestrator::{JobOrchestrator, JobResult, Submission};
pub use storage::{HttpObjectStore, ObjectStore, StorageError, StoredObject};
