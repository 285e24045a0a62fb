//! Run one claimed job to a terminal state: attempts, progress, backoff.

use std::sync::Arc;

use crate::adapter::{TransferPhase, TransferProgress, TransferRequest};
use crate::error::JobError;
use crate::events::Event;
use crate::job::{Job, JobId, JobStatus};
use crate::retry::RetryDecision;

use super::Shared;

/// Fold one progress callback into the job. Returns the snapshot when the
/// percentage or status changed (the caller publishes it), None otherwise.
fn apply_progress(job: &mut Job, p: &TransferProgress) -> Option<Job> {
    if !matches!(job.status, JobStatus::Running | JobStatus::Finalizing) {
        return None;
    }
    let before = (job.status, job.progress);
    match p.phase {
        TransferPhase::Downloading => {
            if let Some(pct) = p.percent() {
                job.progress = job.progress.max(pct);
            }
            job.speed = p.rate;
            job.eta = p.eta;
        }
        TransferPhase::Finished => {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Finalizing;
            }
            job.progress = 100;
            job.eta = None;
        }
    }
    (before != (job.status, job.progress)).then(|| job.clone())
}

fn on_progress(shared: &Shared, id: JobId, p: TransferProgress) {
    if let Some(snapshot) = shared.store.mutate(&id, |job| apply_progress(job, &p)).flatten() {
        shared.publish_progress(snapshot);
    }
}

/// Enter `running` for `attempt`. None when the job can no longer run
/// (cancelled after the claim, or gone).
fn start_attempt(shared: &Shared, id: JobId, attempt: u32) -> Option<Job> {
    match shared.store.transition(&id, JobStatus::Running, |j| {
        j.attempts = attempt;
        j.speed = None;
        j.eta = None;
    }) {
        Ok(job) => Some(job),
        Err(JobError::InvalidTransition { from, .. }) => {
            tracing::info!(job_id = %id, status = %from, "job no longer runnable, skipping");
            None
        }
        Err(JobError::NotFound(_)) => {
            tracing::warn!(job_id = %id, "claimed job disappeared");
            None
        }
    }
}

/// Terminal failure. Also used by the loop when the job task itself crashed.
pub(super) fn fail_job(shared: &Shared, id: JobId, error: String) {
    match shared.store.transition(&id, JobStatus::Failed, |j| {
        j.message = Some(error.clone());
        j.speed = None;
        j.eta = None;
    }) {
        Ok(job) => {
            shared.publish_progress(job);
            shared.bus.publish(Event::Failed { job_id: id, error });
        }
        Err(e) => tracing::error!(job_id = %id, error = %e, "could not mark job failed"),
    }
}

pub(super) async fn run_job(shared: Arc<Shared>, id: JobId) {
    let settings = &shared.settings;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let Some(job) = start_attempt(&shared, id, attempt) else {
            return;
        };
        let request = TransferRequest {
            url: job.url.clone(),
            options: job.options.clone(),
            user_agent: settings.identities.for_attempt(attempt).map(str::to_string),
            concurrent_fragments: settings.concurrent_fragments,
            output_dir: settings.output_dir.clone(),
        };
        shared.publish_progress(job);
        tracing::info!(job_id = %id, attempt, url = %request.url, "transfer started");

        let progress = |p: TransferProgress| on_progress(&shared, id, p);
        let error = match shared.adapter.execute_transfer(&request, &progress).await {
            Ok(outcome) => {
                let file = outcome.file_name();
                match shared.store.transition(&id, JobStatus::Completed, |j| {
                    j.progress = 100;
                    j.filename = Some(file.clone());
                    j.message = None;
                    j.eta = None;
                }) {
                    Ok(job) => {
                        tracing::info!(job_id = %id, attempt, file = %file, "job completed");
                        shared.publish_progress(job);
                        shared.bus.publish(Event::Done { job_id: id, file });
                    }
                    Err(e) => tracing::error!(job_id = %id, error = %e, "could not mark job completed"),
                }
                return;
            }
            Err(e) => e.to_string(),
        };

        match settings.retry.decide(attempt) {
            RetryDecision::NoRetry => {
                tracing::warn!(job_id = %id, attempt, error = %error, "job failed, attempts exhausted");
                fail_job(&shared, id, error);
                return;
            }
            RetryDecision::RetryAfter(delay) => {
                match shared.store.transition(&id, JobStatus::Retrying, |j| {
                    j.message = Some(error.clone());
                    j.speed = None;
                    j.eta = None;
                }) {
                    Ok(job) => shared.publish_progress(job),
                    Err(e) => {
                        tracing::error!(job_id = %id, error = %e, "could not mark job retrying");
                        return;
                    }
                }
                shared.bus.publish(Event::Retry {
                    job_id: id,
                    attempt,
                    error: error.clone(),
                });
                tracing::warn!(job_id = %id, attempt, ?delay, error = %error, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobOptions, JobSpec};

    fn running_job() -> Job {
        let mut job = Job::from_spec(JobSpec::new("https://youtu.be/a", JobOptions::default()));
        job.status = JobStatus::Running;
        job
    }

    #[test]
    fn progress_never_decreases() {
        let mut job = running_job();
        assert!(apply_progress(&mut job, &TransferProgress::downloading(60, Some(100))).is_some());
        assert!(apply_progress(&mut job, &TransferProgress::downloading(10, Some(100))).is_none());
        assert_eq!(job.progress, 60);
    }

    #[test]
    fn unknown_total_keeps_percent_but_records_rate() {
        let mut job = running_job();
        job.progress = 40;
        let mut p = TransferProgress::downloading(10, None);
        p.rate = Some(1000.0);
        assert!(apply_progress(&mut job, &p).is_none());
        assert_eq!(job.progress, 40);
        assert_eq!(job.speed, Some(1000.0));
    }

    #[test]
    fn finished_phase_enters_finalizing_at_full_progress() {
        let mut job = running_job();
        let snap = apply_progress(&mut job, &TransferProgress::finished()).unwrap();
        assert_eq!(snap.status, JobStatus::Finalizing);
        assert_eq!(snap.progress, 100);
        // a second stream (e.g. the audio track) keeps finalizing
        assert!(apply_progress(&mut job, &TransferProgress::downloading(5, Some(10))).is_none());
        assert_eq!(job.status, JobStatus::Finalizing);
    }

    #[test]
    fn ignored_outside_running_states() {
        let mut job = running_job();
        job.status = JobStatus::Cancelled;
        assert!(apply_progress(&mut job, &TransferProgress::finished()).is_none());
        assert_eq!(job.progress, 0);
    }
}
