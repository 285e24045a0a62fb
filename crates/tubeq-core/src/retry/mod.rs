//! Retry handling for job attempts.
//!
//! Every adapter failure is retried until the attempt budget is spent, and
//! each attempt presents a different client identity to the origin.

mod identity;
mod policy;

pub use identity::IdentityRotation;
pub use policy::{RetryDecision, RetryPolicy};
