pub mod adapter;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod job;
pub mod logging;
pub mod queue;
pub mod retry;
pub mod store;
