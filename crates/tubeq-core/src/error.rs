//! Error types surfaced by the store and the queue controller.

use crate::adapter::AdapterError;
use crate::job::{JobId, JobStatus};

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Failures returned synchronously to callers of the queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("URL host not allowed: {0}")]
    DisallowedDomain(String),
    #[error("invalid job id: {0}")]
    InvalidJobId(String),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("cannot cancel job {id} in state {status}")]
    CannotCancel { id: JobId, status: JobStatus },
    #[error("no valid items to enqueue")]
    NoValidItems,
    #[error("collection expansion failed: {0}")]
    CollectionResolution(#[source] AdapterError),
    #[error("no entries found in collection")]
    EmptyCollection,
    #[error("worker already running")]
    WorkerAlreadyRunning,
}

