use std::io;
use std::time::Duration;

/// Failure reported by a resolver/downloader.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with status {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("unexpected resolver output: {0}")]
    Parse(String),
    #[error("resolver did not report an output file")]
    MissingOutput,
    #[error("resolver timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        AdapterError::Parse(e.to_string())
    }
}
