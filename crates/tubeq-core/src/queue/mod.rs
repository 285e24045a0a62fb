//! Job lifecycle controller and the single background worker.
//!
//! `JobQueue` is the public face of the core: callers enqueue, cancel and
//! query through it and observe outcomes on the event stream. Exactly one
//! worker task (see [`JobQueue::spawn_worker`]) executes jobs, one at a time,
//! in submission order.

mod execute;
mod validate;
mod worker;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::adapter::MediaAdapter;
use crate::config::TubeqConfig;
use crate::error::{JobError, QueueError};
use crate::events::{Event, EventBus, EventStream};
use crate::job::{unix_timestamp, Job, JobId, JobOptions, JobSpec};
use crate::retry::{IdentityRotation, RetryPolicy};
use crate::store::JobStore;

pub use validate::{parse_job_id, validate_url};
pub use worker::WorkerHandle;

/// Knobs the controller and worker need, resolved from [`TubeqConfig`].
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub allowed_domains: Vec<String>,
    pub poll_interval: Duration,
    pub event_capacity: usize,
    pub retry: RetryPolicy,
    pub identities: IdentityRotation,
    pub max_collection_items: usize,
    pub concurrent_fragments: u32,
    pub output_dir: PathBuf,
    pub eager_metadata: bool,
    pub terminal_ttl: Option<Duration>,
}

impl QueueSettings {
    /// Settings from config; `base` anchors the default output directory.
    pub fn from_config(cfg: &TubeqConfig, base: &Path) -> Self {
        Self::with_output_dir(cfg, cfg.output_dir_or(base))
    }

    /// Settings from config, saving into `output_dir` as given.
    pub fn with_output_dir(cfg: &TubeqConfig, output_dir: PathBuf) -> Self {
        Self {
            allowed_domains: cfg.allowed_domains.clone(),
            poll_interval: cfg.poll_interval(),
            event_capacity: cfg.event_capacity,
            retry: RetryPolicy::from_config(&cfg.retry_config()),
            identities: IdentityRotation::new(cfg.user_agents.clone()),
            max_collection_items: cfg.max_collection_items,
            concurrent_fragments: cfg.concurrent_fragments,
            output_dir,
            eager_metadata: cfg.eager_metadata,
            terminal_ttl: cfg.terminal_ttl(),
        }
    }
}

/// One item of a bulk submission.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub url: String,
    pub options: JobOptions,
}

impl EnqueueRequest {
    pub fn new(url: impl Into<String>, options: JobOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

/// A bulk item that failed validation.
#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub url: String,
    pub reason: String,
}

/// Result of [`JobQueue::enqueue_bulk`].
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub job_ids: Vec<JobId>,
    pub skipped: Vec<SkippedItem>,
}

impl BulkOutcome {
    pub fn created(&self) -> usize {
        self.job_ids.len()
    }
}

pub(crate) struct Shared {
    pub(crate) store: JobStore,
    pub(crate) bus: EventBus,
    pub(crate) adapter: Arc<dyn MediaAdapter>,
    pub(crate) settings: QueueSettings,
    pub(crate) wake: Notify,
    pub(crate) worker_running: AtomicBool,
}

impl Shared {
    pub(crate) fn publish_progress(&self, job: Job) {
        self.bus.publish(Event::progress(job));
    }

    pub(crate) fn evict_expired(&self) -> usize {
        let Some(ttl) = self.settings.terminal_ttl else {
            return 0;
        };
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let cutoff = unix_timestamp().saturating_sub(ttl_secs);
        let n = self.store.evict_terminal_before(cutoff);
        if n > 0 {
            tracing::debug!(evicted = n, "evicted finished jobs");
        }
        n
    }
}

/// Cheap to clone; all clones share one store, bus and worker slot.
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("adapter", &self.shared.adapter.name())
            .field("jobs", &self.shared.store.len())
            .finish()
    }
}

impl JobQueue {
    pub fn new(settings: QueueSettings, adapter: Arc<dyn MediaAdapter>) -> Self {
        let bus = EventBus::new(settings.event_capacity);
        Self {
            shared: Arc::new(Shared {
                store: JobStore::new(),
                bus,
                adapter,
                settings,
                wake: Notify::new(),
                worker_running: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    fn validate(&self, url: &str) -> Result<String, QueueError> {
        validate_url(url, &self.shared.settings.allowed_domains).map(|_| url.trim().to_string())
    }

    fn insert(&self, spec: JobSpec) -> JobId {
        let job = self.shared.store.create(spec);
        tracing::info!(job_id = %job.id, url = %job.url, "job enqueued");
        self.shared.bus.publish(Event::Enqueued {
            job_id: job.id,
            url: job.url.clone(),
        });
        self.shared.wake.notify_one();
        job.id
    }

    async fn with_metadata(&self, mut spec: JobSpec) -> JobSpec {
        if !self.shared.settings.eager_metadata {
            return spec;
        }
        match self.shared.adapter.resolve_metadata(&spec.url).await {
            Ok(meta) => {
                spec.title = Some(meta.title);
                spec.thumbnail_url = meta.thumbnail_url;
            }
            Err(e) => {
                tracing::warn!(url = %spec.url, error = %e, "metadata lookup failed, enqueueing without it");
            }
        }
        spec
    }

    /// Validate, optionally resolve display metadata, create a `pending` job.
    pub async fn enqueue(&self, url: &str, options: JobOptions) -> Result<JobId, QueueError> {
        let url = self.validate(url)?;
        let spec = self.with_metadata(JobSpec::new(url, options)).await;
        Ok(self.insert(spec))
    }

    /// Enqueue every valid item; invalid ones are skipped and reported.
    /// Fails only when no item was valid.
    pub async fn enqueue_bulk(
        &self,
        items: Vec<EnqueueRequest>,
    ) -> Result<BulkOutcome, QueueError> {
        let mut out = BulkOutcome::default();
        for item in items {
            match self.validate(&item.url) {
                Ok(url) => {
                    let spec = self.with_metadata(JobSpec::new(url, item.options)).await;
                    out.job_ids.push(self.insert(spec));
                }
                Err(e) => {
                    tracing::debug!(url = %item.url, error = %e, "bulk item skipped");
                    out.skipped.push(SkippedItem {
                        url: item.url,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if out.job_ids.is_empty() {
            return Err(QueueError::NoValidItems);
        }
        Ok(out)
    }

    /// Resolve a playlist/channel and enqueue its members, up to
    /// `max_collection_items`. Entry title/thumbnail come from the listing.
    pub async fn expand_collection(
        &self,
        url: &str,
        options: JobOptions,
    ) -> Result<Vec<JobId>, QueueError> {
        let url = self.validate(url)?;
        let entries = self
            .shared
            .adapter
            .resolve_collection(&url)
            .await
            .map_err(QueueError::CollectionResolution)?;
        if entries.is_empty() {
            return Err(QueueError::EmptyCollection);
        }
        let cap = self.shared.settings.max_collection_items;
        let total = entries.len();

        // The cap counts created jobs; skipped entries do not use a slot.
        let mut ids = Vec::new();
        for entry in entries {
            if ids.len() >= cap {
                tracing::info!(url = %url, entries = total, cap, "collection truncated");
                break;
            }
            let entry_url = match self.validate(&entry.url) {
                Ok(u) => u,
                Err(e) => {
                    tracing::debug!(url = %entry.url, error = %e, "collection entry skipped");
                    continue;
                }
            };
            let mut spec = JobSpec::new(entry_url, options.clone());
            spec.title = entry.title;
            spec.thumbnail_url = entry.thumbnail;
            ids.push(self.insert(spec));
        }
        if ids.is_empty() {
            return Err(QueueError::NoValidItems);
        }
        Ok(ids)
    }

    /// Cancel a job that has not started executing.
    pub fn cancel(&self, id: &JobId) -> Result<Job, QueueError> {
        let job = self.shared.store.cancel(id).map_err(|e| match e {
            JobError::NotFound(id) => QueueError::JobNotFound(id),
            JobError::InvalidTransition { from, .. } => QueueError::CannotCancel {
                id: *id,
                status: from,
            },
        })?;
        tracing::info!(job_id = %id, "job cancelled");
        self.shared.bus.publish(Event::Cancelled { job_id: *id });
        Ok(job)
    }

    pub fn get(&self, id: &JobId) -> Result<Job, QueueError> {
        self.shared
            .store
            .get(id)
            .ok_or(QueueError::JobNotFound(*id))
    }

    /// Snapshot of all jobs in submission order.
    pub fn list(&self) -> Vec<Job> {
        self.shared.store.list()
    }

    /// Cursor on the shared event stream. Concurrent cursors compete for events.
    pub fn subscribe(&self) -> EventStream {
        self.shared.bus.subscribe()
    }

    /// Events dropped because the stream was not drained fast enough.
    pub fn dropped_events(&self) -> u64 {
        self.shared.bus.dropped()
    }

    /// Apply the retention policy now. Returns the number of evicted jobs.
    pub fn evict_expired(&self) -> usize {
        self.shared.evict_expired()
    }

    /// Start the single worker task. Must be called inside a tokio runtime.
    pub fn spawn_worker(&self) -> Result<WorkerHandle, QueueError> {
        worker::spawn(Arc::clone(&self.shared))
    }
}
