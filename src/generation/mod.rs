//! Orchestration of one try-on generation.
pub mod gate;
pub mod pipeline;
pub mod poller;

pub use pipeline::{Generated, Generator};
