//! The single worker loop: claim, execute, repeat; idle on a wake signal.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::QueueError;

use super::execute;
use super::Shared;

/// Owner of the running worker. Dropping it stops the worker once the
/// current job ends, leaving later jobs pending; call
/// [`WorkerHandle::shutdown`] to wait for that.
#[must_use = "dropping the handle stops the worker"]
#[derive(Debug)]
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop and wait until it has. A job already executing
    /// runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "worker task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub(super) fn spawn(shared: Arc<Shared>) -> Result<WorkerHandle, QueueError> {
    if shared
        .worker_running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(QueueError::WorkerAlreadyRunning);
    }
    let (stop, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run(shared, stop_rx));
    Ok(WorkerHandle { stop, task })
}

async fn run(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    tracing::info!(adapter = shared.adapter.name(), "worker started");
    loop {
        // A dropped handle closes the channel; treat that as a stop request.
        if *stop.borrow() || stop.has_changed().is_err() {
            break;
        }
        match shared.store.claim_next_pending() {
            Some(job) => {
                let id = job.id;
                shared.publish_progress(job);
                // Own task per job: a panic in the adapter fails that job, not the loop.
                let task = tokio::spawn(execute::run_job(Arc::clone(&shared), id));
                if let Err(e) = task.await {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        "job task cancelled".to_string()
                    };
                    tracing::error!(job_id = %id, error = %message, "job task crashed");
                    execute::fail_job(&shared, id, format!("internal error: {message}"));
                }
            }
            None => {
                shared.evict_expired();
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(shared.settings.poll_interval) => {}
                    changed = stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    shared.worker_running.store(false, Ordering::Release);
    tracing::info!("worker stopped");
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
