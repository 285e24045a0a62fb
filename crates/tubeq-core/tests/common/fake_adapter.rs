//! Scripted in-process adapter: each transfer pops the next step.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tubeq_core::adapter::{
    AdapterError, CollectionEntry, MediaAdapter, MediaMetadata, ProgressFn, TransferOutcome,
    TransferProgress, TransferRequest,
};

#[derive(Debug, Clone)]
pub enum Step {
    /// Report 10/40/40/90 percent, then finished, then succeed.
    Succeed,
    /// Report 30 percent, then fail with the message.
    Fail(String),
    Panic,
}

#[derive(Default)]
pub struct FakeAdapter {
    steps: Mutex<VecDeque<Step>>,
    fallback: Mutex<Option<Step>>,
    entries: Mutex<Option<Vec<CollectionEntry>>>,
    metadata_fails: bool,
    delay: Duration,
    transfers: Mutex<Vec<TransferRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    pub fn with_steps(self, steps: impl IntoIterator<Item = Step>) -> Self {
        *self.steps.lock().unwrap() = steps.into_iter().collect();
        self
    }

    /// Step used once the scripted steps run out (default: succeed).
    pub fn otherwise(self, step: Step) -> Self {
        *self.fallback.lock().unwrap() = Some(step);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_metadata_failure(mut self) -> Self {
        self.metadata_fails = true;
        self
    }

    /// Collection of `n` watch URLs.
    pub fn with_collection(self, n: usize) -> Self {
        self.with_entry_urls((0..n).map(|i| format!("https://www.youtube.com/watch?v=v{i:04}")))
    }

    /// Collection listing exactly these entry URLs, in order.
    pub fn with_entry_urls(self, urls: impl IntoIterator<Item = String>) -> Self {
        let entries = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| CollectionEntry {
                url,
                title: Some(format!("Entry {i}")),
                thumbnail: None,
                duration: Some(60.0),
            })
            .collect();
        *self.entries.lock().unwrap() = Some(entries);
        self
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().unwrap().clone()
    }

    /// Highest number of transfers ever in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(Step::Succeed)
    }
}

fn slug(url: &str) -> String {
    url.rsplit(|c| c == '/' || c == '=').next().unwrap_or("media").to_string()
}

#[async_trait]
impl MediaAdapter for FakeAdapter {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve_metadata(&self, url: &str) -> Result<MediaMetadata, AdapterError> {
        if self.metadata_fails {
            return Err(AdapterError::Other("metadata unavailable".into()));
        }
        Ok(MediaMetadata {
            title: format!("Title of {}", slug(url)),
            url: url.to_string(),
            thumbnail_url: Some(format!("https://i.ytimg.com/vi/{}/hq.jpg", slug(url))),
            ..Default::default()
        })
    }

    async fn resolve_collection(&self, _url: &str) -> Result<Vec<CollectionEntry>, AdapterError> {
        self.entries
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AdapterError::Other("playlist unavailable".into()))
    }

    async fn execute_transfer(
        &self,
        request: &TransferRequest,
        on_progress: &ProgressFn<'_>,
    ) -> Result<TransferOutcome, AdapterError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.transfers.lock().unwrap().push(request.clone());

        let step = self.next_step();
        let result = match step {
            Step::Succeed => {
                for done in [10, 40, 40, 90] {
                    tokio::time::sleep(self.delay).await;
                    on_progress(TransferProgress::downloading(done, Some(100)));
                }
                tokio::time::sleep(self.delay).await;
                on_progress(TransferProgress::finished());
                let path = request.output_dir.join(format!("{}.webm", slug(&request.url)));
                Ok(TransferOutcome::normalized(path, request.options.kind))
            }
            Step::Fail(msg) => {
                tokio::time::sleep(self.delay).await;
                on_progress(TransferProgress::downloading(30, Some(100)));
                Err(AdapterError::Other(msg))
            }
            Step::Panic => panic!("adapter exploded"),
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
