//! Client side of the RunningHub AI-app task API.
pub mod client;
pub mod transport;
pub mod types;
pub mod upload;
