//! Common error type and alias.
//!
//! Variants follow the failure kinds of a generation attempt: transport
//! failures, upstream API rejections, quota refusals, task failures, polling
//! timeouts and responses that carry no usable image URL.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::runninghub::transport::TransportError;
use crate::runninghub::types::TaskStatus;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never reached the server, even after retrying.
    #[error("Network error after {attempts} attempts: {message}")]
    Network { attempts: u32, message: String },

    /// A single, unretried request failed at the transport level.
    #[error("Request failed: {0}")]
    HttpClient(#[from] TransportError),

    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    #[error("Too many tasks in progress ({current}/{limit}). Please wait for a running task to finish.")]
    QuotaExceeded { current: u32, limit: u32 },

    /// Outputs are not ready yet. Polling treats this as a normal iteration.
    #[error("Task is still {}", TaskStatus::pending_label(.0))]
    TaskPending(TaskStatus),

    #[error("{0}")]
    TaskFailed(String),

    #[error("Task polling timeout - task did not complete in time ({attempts} attempts)")]
    Timeout { attempts: u32 },

    #[error("{0}")]
    Extraction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A generation is already in progress")]
    Busy,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The background task running a generation panicked or was aborted.
    #[error("Generation task ended abnormally: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Failure while waiting on an accepted task.
    #[error("Failed to get task result: {0}")]
    TaskResult(#[source] Box<AppError>),

    #[error("Failed to generate (attempt {attempt}): {source}")]
    Generation {
        attempt: Uuid,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn api(message: impl Into<String>) -> Self {
        AppError::Api { status: None, message: message.into() }
    }

    /// True for the transient "still running / still queued" signal.
    pub fn is_pending(&self) -> bool {
        matches!(self, AppError::TaskPending(_))
    }

    /// Wrap an error with the id of the generation attempt it came from.
    pub fn in_attempt(self, attempt: Uuid) -> Self {
        match self {
            wrapped @ AppError::Generation { .. } => wrapped,
            other => AppError::Generation { attempt, source: Box::new(other) },
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Generation { source, .. } | AppError::TaskResult(source) => source.root(),
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.root() {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Busy => StatusCode::CONFLICT,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Network { .. }
            | AppError::HttpClient(_)
            | AppError::Api { .. }
            | AppError::TaskPending(_)
            | AppError::TaskFailed(_)
            | AppError::Extraction(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
