//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::error::{AppError, AppResult};
use crate::generation::Generated;
use crate::runninghub::types::{AccountStatus, Asset, Progress, TaskOutput};

pub async fn root() -> &'static str {
    "Try-on Proxy"
}

/// Expects multipart file fields `model` and `clothing`.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<Generated>> {
    let mut model = None;
    let mut clothing = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name != "model" && name != "clothing" {
            tracing::debug!("Ignoring multipart field {}", name);
            continue;
        }
        let file_name = field.file_name().map(str::to_string).unwrap_or_else(|| format!("{}.png", name));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| AppError::InvalidInput(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::InvalidInput(format!("'{}' is empty", name)));
        }
        let mut asset = Asset::new(file_name, bytes.to_vec());
        if let Some(ct) = content_type {
            asset = asset.with_mime(ct);
        }
        if name == "model" {
            model = Some(asset);
        } else {
            clothing = Some(asset);
        }
    }

    let (Some(model), Some(clothing)) = (model, clothing) else {
        return Err(AppError::InvalidInput("Please upload both model and clothing images.".to_string()));
    };
    state.generator.clone().generate_detached(model, clothing).await.map(Json)
}

pub async fn progress(State(state): State<Arc<AppState>>) -> Json<Progress> {
    Json(state.generator.progress())
}

pub async fn account(State(state): State<Arc<AppState>>) -> AppResult<Json<AccountStatus>> {
    state.generator.client().account_status().await.map(Json)
}

pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> AppResult<Json<Value>> {
    let status = state.generator.client().check_task_status(&task_id).await?;
    Ok(Json(json!({ "taskId": task_id, "status": status })))
}

pub async fn task_outputs(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> AppResult<Json<Value>> {
    let output = state.generator.client().task_outputs(&task_id).await?;
    let body = match output {
        TaskOutput::Url(url) => json!({ "taskId": task_id, "fileUrl": url }),
        TaskOutput::Descriptor(descriptor) => json!({ "taskId": task_id, "output": descriptor }),
    };
    Ok(Json(body))
}
