//! Resolver/downloader collaborator.
//!
//! The queue only depends on [`MediaAdapter`]; it does not know how metadata
//! is fetched or how bytes reach disk. [`YtDlpAdapter`] drives the `yt-dlp`
//! executable; tests plug in scripted fakes.

mod error;
mod progress;
mod types;
mod ytdlp;

use async_trait::async_trait;

pub use error::AdapterError;
pub use progress::{TransferPhase, TransferProgress};
pub use types::{
    CollectionEntry, MediaMetadata, Rendition, SubtitleTrack, TransferOutcome, TransferRequest,
};
pub use ytdlp::{YtDlpAdapter, YtDlpSettings};

/// Progress callback handed to [`MediaAdapter::execute_transfer`]. Invoked on the
/// transfer's own task, zero or more times.
pub type ProgressFn<'a> = dyn Fn(TransferProgress) + Send + Sync + 'a;

#[async_trait]
pub trait MediaAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read-only lookup used for display before (or without) downloading.
    async fn resolve_metadata(&self, url: &str) -> Result<MediaMetadata, AdapterError>;

    /// List the members of a playlist/channel URL.
    async fn resolve_collection(&self, url: &str) -> Result<Vec<CollectionEntry>, AdapterError>;

    /// Download (and post-process) one item. Not interruptible once started.
    async fn execute_transfer(
        &self,
        request: &TransferRequest,
        on_progress: &ProgressFn<'_>,
    ) -> Result<TransferOutcome, AdapterError>;
}
