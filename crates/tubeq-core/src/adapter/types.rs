use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::job::{JobOptions, OutputKind};

/// A downloadable video rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub format_id: String,
    pub height: u32,
    pub ext: Option<String>,
}

/// Subtitle availability for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub lang: String,
    /// Uploaded by the author.
    pub manual: bool,
    /// Generated by the platform.
    pub automatic: bool,
}

/// Display metadata for a single item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub url: String,
    /// Seconds.
    pub duration: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub channel: Option<String>,
    /// Best first, at most five.
    pub renditions: Vec<Rendition>,
    pub subtitles: Vec<SubtitleTrack>,
}

/// One member of a playlist/channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub url: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
}

/// Everything a transfer needs.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub options: JobOptions,
    /// User-Agent to present for this attempt.
    pub user_agent: Option<String>,
    /// Segment-level parallelism inside the transfer.
    pub concurrent_fragments: u32,
    pub output_dir: PathBuf,
}

/// Where the finished file landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub output_path: PathBuf,
}

impl TransferOutcome {
    /// Final path with the extension the requested kind implies.
    pub fn normalized(output_path: PathBuf, kind: OutputKind) -> Self {
        let ext = kind.extension();
        let output_path = match output_path.extension() {
            Some(e) if e.eq_ignore_ascii_case(ext) => output_path,
            _ => output_path.with_extension(ext),
        };
        Self { output_path }
    }

    /// Base name recorded on the job.
    pub fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output_path.to_string_lossy().into_owned())
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }
}
