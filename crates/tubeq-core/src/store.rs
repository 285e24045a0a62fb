//! In-memory Job Store: the single source of truth for job state.
//!
//! All reads and writes go through one mutex. Methods that change a job
//! return the post-mutation snapshot so the caller can publish an event
//! after the lock is released.

use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::JobError;
use crate::job::{unix_timestamp, Job, JobId, JobSpec, JobStatus};

/// Insertion-ordered map of jobs behind an exclusive lock.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<IndexMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic inside a mutation closure poisons the mutex; the map itself is
    // still consistent (closures only touch one record), so keep serving it.
    fn lock(&self) -> MutexGuard<'_, IndexMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new `pending` job and return its snapshot.
    pub fn create(&self, spec: JobSpec) -> Job {
        let job = Job::from_spec(spec);
        let mut jobs = self.lock();
        debug_assert!(!jobs.contains_key(&job.id));
        jobs.insert(job.id, job.clone());
        tracing::debug!(job_id = %job.id, url = %job.url, "job created");
        job
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    /// Snapshot of every job, in submission order.
    pub fn list(&self) -> Vec<Job> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Apply `f` to the job under the lock. Returns None (and does nothing) if the job is gone.
    pub fn mutate<R, F>(&self, id: &JobId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut jobs = self.lock();
        jobs.get_mut(id).map(f)
    }

    /// Move the job to `next` if the state machine allows it, then apply `f`.
    /// The check and the write happen under one lock acquisition.
    pub fn transition<F>(&self, id: &JobId, next: JobStatus, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.lock();
        let job = jobs.get_mut(id).ok_or(JobError::NotFound(*id))?;
        if !job.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to: next,
            });
        }
        job.status = next;
        if next.is_terminal() {
            job.finished_at = Some(unix_timestamp());
        }
        f(job);
        Ok(job.clone())
    }

    /// Flip the first `pending` job (submission order) to `queued` and return it.
    pub fn claim_next_pending(&self) -> Option<Job> {
        let mut jobs = self.lock();
        let job = jobs
            .values_mut()
            .find(|j| j.status == JobStatus::Pending)?;
        job.status = JobStatus::Queued;
        Some(job.clone())
    }

    /// Cancel a job that has not started executing.
    pub fn cancel(&self, id: &JobId) -> Result<Job, JobError> {
        self.transition(id, JobStatus::Cancelled, |_| {})
    }

    /// Number of jobs currently held by the worker.
    pub fn active_count(&self) -> usize {
        self.lock().values().filter(|j| j.status.is_active()).count()
    }

    /// Drop terminal jobs that finished at or before `cutoff` (unix seconds). Returns how many were removed.
    pub fn evict_terminal_before(&self, cutoff: i64) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, j| {
            !(j.status.is_terminal() && j.finished_at.is_some_and(|t| t <= cutoff))
        });
        before - jobs.len()
    }
}
