//! Job payload construction.
pub mod request;
