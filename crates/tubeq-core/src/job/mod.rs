//! Job records and the lifecycle state machine.
//!
//! A job is created `pending` by the controller, claimed and driven to a
//! terminal state by the single worker, and only ever mutated under the
//! Job Store lock.

mod status;
mod types;

pub use status::JobStatus;
pub use types::{Job, JobId, JobOptions, JobSpec, OutputKind, Quality};

pub(crate) use types::unix_timestamp;
