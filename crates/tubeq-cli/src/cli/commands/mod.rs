//! CLI command handlers, one file per command.

mod cancel;
mod completions;
mod expand;
mod get;
mod info;
mod render;
mod status;

pub use cancel::run_cancel;
pub use completions::run_completions;
pub use expand::run_expand;
pub use get::run_get;
pub use info::run_info;
pub use status::run_status;
