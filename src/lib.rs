//! Try-on generation client and proxy library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the binary.
//! - `runninghub`: Client for the RunningHub task API (upload, submit,
//!   status, outputs, account) over a pluggable `Transport`.
//! - `job`: Job payload construction with the workflow's fixed node bindings.
//! - `generation`: Quota gate, task poller and the end-to-end `Generator`.
//! - `utils`: Response classification/URL extraction and log redaction.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `RunningHubClient`,
//! `Generator`, and `Asset`.
pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod job;
pub mod runninghub;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use generation::Generator;
pub use runninghub::client::RunningHubClient;
pub use runninghub::types::Asset;
