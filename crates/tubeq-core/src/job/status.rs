//! Lifecycle states and legal transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job.
///
/// ```text
/// pending -> queued -> running -> finalizing -> completed
///                        |  ^         |
///                        v  |         v
///                      retrying --> failed
/// pending | queued -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Finalizing,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Retrying => "retrying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// No further transitions are permitted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// The job is held by the worker (at most one job is ever in one of these).
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::Retrying | JobStatus::Finalizing
        )
    }

    /// Cancellation is only legal before the worker starts executing.
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Queued)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Queued) | (Pending, Cancelled) => true,
            (Queued, Running) | (Queued, Cancelled) => true,
            (Running, Finalizing) | (Running, Retrying) => true,
            (Running, Completed) | (Running, Failed) => true,
            (Finalizing, Completed) | (Finalizing, Retrying) | (Finalizing, Failed) => true,
            (Retrying, Running) | (Retrying, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
