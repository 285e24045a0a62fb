//! Progress reported by a transfer (bytes done, total, rate, ETA).
//!
//! The queue turns these into a job percentage; a missing total leaves the
//! percentage where it was.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    /// Bytes are still arriving.
    Downloading,
    /// Transfer finished; post-processing (remux, extraction) may follow.
    Finished,
}

/// One progress callback payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub phase: TransferPhase,
    pub bytes_done: u64,
    /// Exact or estimated total size, if known.
    pub bytes_total: Option<u64>,
    /// Bytes per second.
    pub rate: Option<f64>,
    /// Seconds remaining.
    pub eta: Option<u64>,
}

impl TransferProgress {
    pub fn downloading(bytes_done: u64, bytes_total: Option<u64>) -> Self {
        Self {
            phase: TransferPhase::Downloading,
            bytes_done,
            bytes_total,
            rate: None,
            eta: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            phase: TransferPhase::Finished,
            bytes_done: 0,
            bytes_total: None,
            rate: None,
            eta: None,
        }
    }

    /// Fraction complete in [0.0, 1.0], or None when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_total {
            Some(0) | None => None,
            Some(total) => Some((self.bytes_done as f64 / total as f64).min(1.0)),
        }
    }

    /// Whole percent (truncated), or None when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.phase == TransferPhase::Finished {
            return Some(100);
        }
        self.fraction().map(|f| (f * 100.0) as u8)
    }
}
