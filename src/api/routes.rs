use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::generation::Generator;

/// Upper bound for a multipart request carrying two photos.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState {
    pub generator: Arc<Generator>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/generate", post(handlers::generate))
        .route("/progress", get(handlers::progress))
        .route("/account", get(handlers::account))
        .route("/tasks/:task_id/status", get(handlers::task_status))
        .route("/tasks/:task_id/outputs", get(handlers::task_outputs))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
