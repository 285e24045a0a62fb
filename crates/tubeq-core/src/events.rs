//! Job notifications and the best-effort Event Bus.
//!
//! The bus is one bounded queue with one logical stream. `publish` never
//! blocks: when the queue is full the event is dropped and logged. Every
//! `EventStream` pulls from the same receiver, so two concurrent streams
//! race for events rather than each seeing all of them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Mutex;

use crate::job::{Job, JobId};

/// Notification about a single job. Wire tags match the `type` field consumers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "job_enqueued")]
    Enqueued { job_id: JobId, url: String },
    /// Status or progress change; carries the full job snapshot.
    #[serde(rename = "job_progress")]
    Progress { job_id: JobId, data: Job },
    #[serde(rename = "job_retry")]
    Retry {
        job_id: JobId,
        attempt: u32,
        error: String,
    },
    #[serde(rename = "job_done")]
    Done { job_id: JobId, file: String },
    #[serde(rename = "job_failed")]
    Failed { job_id: JobId, error: String },
    #[serde(rename = "job_cancelled")]
    Cancelled { job_id: JobId },
}

impl Event {
    pub fn progress(job: Job) -> Self {
        Event::Progress {
            job_id: job.id,
            data: job,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            Event::Enqueued { job_id, .. }
            | Event::Progress { job_id, .. }
            | Event::Retry { job_id, .. }
            | Event::Done { job_id, .. }
            | Event::Failed { job_id, .. }
            | Event::Cancelled { job_id } => *job_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Enqueued { .. } => "job_enqueued",
            Event::Progress { .. } => "job_progress",
            Event::Retry { .. } => "job_retry",
            Event::Done { .. } => "job_done",
            Event::Failed { .. } => "job_failed",
            Event::Cancelled { .. } => "job_cancelled",
        }
    }

    /// Server-sent-events frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Bounded, non-blocking publish side plus the shared receive side.
#[derive(Debug)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
    rx: Arc<Mutex<mpsc::Receiver<Event>>>,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue without blocking. Returns false if the event was dropped.
    pub fn publish(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    job_id = %ev.job_id(),
                    kind = ev.kind(),
                    dropped_total = n,
                    "event queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(ev)) => {
                tracing::debug!(job_id = %ev.job_id(), "event queue closed");
                false
            }
        }
    }

    /// Open a cursor on the shared stream.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: Arc::clone(&self.rx),
        }
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Pull cursor over the bus. Dropping it has no effect on the bus.
#[derive(Debug, Clone)]
pub struct EventStream {
    rx: Arc<Mutex<mpsc::Receiver<Event>>>,
}

impl EventStream {
    /// Wait for the next event. None once the bus is gone and drained.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.lock().await.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<Event> {
        let mut rx = self.rx.try_lock().ok()?;
        match rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
