//! Types carried by a job record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::status::JobStatus;

/// Process-unique job identifier.
pub type JobId = Uuid;

/// Requested output: audio-only extraction or a muxed video file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[serde(alias = "mp3")]
    Audio,
    #[default]
    #[serde(alias = "mp4")]
    Video,
}

impl OutputKind {
    /// Container extension of the finished file.
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Audio => "mp3",
            OutputKind::Video => "mp4",
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" | "mp3" => Ok(OutputKind::Audio),
            "video" | "mp4" => Ok(OutputKind::Video),
            other => Err(format!("unknown output kind: {other}")),
        }
    }
}

/// Video height cap. Ignored for audio jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080")]
    P1080,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "360")]
    P360,
}

impl Quality {
    pub fn max_height(self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P360 => Some(360),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches('p') {
            "best" => Ok(Quality::Best),
            "1080" => Ok(Quality::P1080),
            "720" => Ok(Quality::P720),
            "360" => Ok(Quality::P360),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_height() {
            Some(h) => write!(f, "{h}"),
            None => f.write_str("best"),
        }
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default, rename = "format")]
    pub kind: OutputKind,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub include_subs: bool,
    #[serde(default)]
    pub subs_langs: Vec<String>,
}

/// Input to `JobStore::create`.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub url: String,
    pub options: JobOptions,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl JobSpec {
    pub fn new(url: impl Into<String>, options: JobOptions) -> Self {
        Self {
            url: url.into(),
            options,
            title: None,
            thumbnail_url: None,
        }
    }
}

/// One tracked transfer, from submission to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub options: JobOptions,
    pub status: JobStatus,
    /// Percent complete, 0..=100.
    pub progress: u8,
    /// Last observed rate in bytes per second.
    pub speed: Option<f64>,
    /// Last observed estimate of seconds remaining.
    pub eta: Option<u64>,
    /// Output file name; set only when completed.
    pub filename: Option<String>,
    /// Last error text (retrying/failed).
    pub message: Option<String>,
    /// Adapter invocations so far.
    pub attempts: u32,
    pub created_at: i64,
    pub finished_at: Option<i64>,
}

impl Job {
    pub(crate) fn from_spec(spec: JobSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: spec.url,
            title: spec.title,
            thumbnail_url: spec.thumbnail_url,
            options: spec.options,
            status: JobStatus::Pending,
            progress: 0,
            speed: None,
            eta: None,
            filename: None,
            message: None,
            attempts: 0,
            created_at: unix_timestamp(),
            finished_at: None,
        }
    }

    /// Name shown to users: the resolved title, or the URL.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
