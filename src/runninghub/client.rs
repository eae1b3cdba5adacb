//! Thin client for the RunningHub task endpoints.
//!
//! - `account_status` posts to the account endpoint for quota figures.
//! - `submit_job` posts a job invocation, retrying transport failures.
//! - `check_task_status` maps the status endpoint onto `TaskStatus`.
//! - `task_outputs` fetches the output file list of a finished task.
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::runninghub::transport::{HttpReply, ReqwestTransport, Transport};
use crate::runninghub::types::{AccountStatus, JobRequest, TaskOutput, TaskStatus};
use crate::utils::redact::log_payload;

/// Business code for "ok" on the status, outputs and account endpoints.
pub const CODE_OK: i64 = 0;
pub const CODE_TASK_RUNNING: i64 = 804;
pub const CODE_TASK_FAILED: i64 = 805;
pub const CODE_TASK_QUEUED: i64 = 813;

#[derive(Clone)]
pub struct RunningHubClient {
    transport: Arc<dyn Transport>,
    config: Arc<Config>,
}

impl RunningHubClient {
    pub fn new(config: Config) -> AppResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        RunningHubClient { transport, config: Arc::new(config) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Fetch the account's quota snapshot.
    pub async fn account_status(&self) -> AppResult<AccountStatus> {
        let body = json!({ "apikey": self.config.api_key });
        let data = self.post_envelope(&self.config.account_status_url, &body).await?;
        if code_of(&data) != Some(CODE_OK) {
            return Err(AppError::api(message_of(&data).unwrap_or("Failed to get account status")));
        }
        let status = AccountStatus::from_data(data.get("data").unwrap_or(&Value::Null));
        tracing::info!(
            current_task_counts = status.current_task_counts,
            remain_coins = ?status.remain_coins,
            "Account status"
        );
        Ok(status)
    }

    /// Submit a job invocation and return the parsed response body.
    ///
    /// Only transport failures are retried, with a linearly growing pause
    /// between attempts. Any received response ends the retry loop.
    pub async fn submit_job(&self, job: &JobRequest) -> AppResult<Value> {
        let url = &self.config.api_url;
        let payload = serde_json::to_value(job)?;
        let attempts = self.config.submit_max_attempts.max(1);
        tracing::info!("Submitting job to RunningHub at URL: {}", url);
        log_payload("Job payload", &payload);

        let mut attempt = 0;
        let reply = loop {
            attempt += 1;
            match self.transport.post_json(url, &payload).await {
                Ok(reply) => break reply,
                Err(e) => {
                    tracing::warn!("Network error (attempt {}/{}): {}", attempt, attempts, e);
                    if attempt >= attempts {
                        return Err(AppError::Network { attempts, message: e.to_string() });
                    }
                    let backoff = Duration::from_millis(self.config.submit_backoff_ms * attempt as u64);
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        if !reply.is_success() {
            let message = http_error_message(&reply);
            tracing::error!("Job submission rejected. Status: {}, Message: {}", reply.status, message);
            return Err(AppError::Api { status: Some(reply.status), message });
        }
        let body = reply.json()?;
        log_payload("Job response", &body);
        Ok(body)
    }

    /// Query the status endpoint for `task_id`.
    pub async fn check_task_status(&self, task_id: &str) -> AppResult<TaskStatus> {
        let body = json!({ "apiKey": self.config.api_key, "taskId": task_id });
        let data = self.post_envelope(&self.config.status_url, &body).await?;
        match code_of(&data) {
            Some(CODE_OK) => {}
            Some(CODE_TASK_RUNNING) => return Ok(TaskStatus::Running),
            Some(CODE_TASK_QUEUED) => return Ok(TaskStatus::Queued),
            Some(CODE_TASK_FAILED) => return Ok(TaskStatus::Failed),
            _ => return Err(AppError::api(message_of(&data).unwrap_or("Failed to check task status"))),
        }
        let status = match data.get("data") {
            Some(Value::String(s)) => TaskStatus::parse(s),
            Some(obj @ Value::Object(_)) => ["taskStatus", "status", "state"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
                .map(TaskStatus::parse)
                .unwrap_or(TaskStatus::Unknown),
            _ => TaskStatus::Unknown,
        };
        Ok(status)
    }

    /// Fetch the outputs of `task_id`.
    ///
    /// Running and queued codes come back as `TaskPending`; a failed task as
    /// `TaskFailed` with the most specific reason the service gave.
    pub async fn task_outputs(&self, task_id: &str) -> AppResult<TaskOutput> {
        let body = json!({ "apiKey": self.config.api_key, "taskId": task_id });
        let data = self.post_envelope(&self.config.outputs_url, &body).await?;
        match code_of(&data) {
            Some(CODE_OK) => {}
            Some(CODE_TASK_RUNNING) => return Err(AppError::TaskPending(TaskStatus::Running)),
            Some(CODE_TASK_QUEUED) => return Err(AppError::TaskPending(TaskStatus::Queued)),
            Some(CODE_TASK_FAILED) => return Err(AppError::TaskFailed(failed_reason(&data))),
            _ => return Err(AppError::api(message_of(&data).unwrap_or("Failed to get task outputs"))),
        }
        let files = data
            .get("data")
            .and_then(Value::as_array)
            .filter(|files| !files.is_empty())
            .ok_or_else(|| AppError::Extraction("No outputs found in response".to_string()))?;
        let url = files
            .iter()
            .find_map(|f| f.get("fileUrl").and_then(Value::as_str).filter(|s| !s.is_empty()));
        Ok(match url {
            Some(url) => TaskOutput::Url(url.to_string()),
            None => TaskOutput::Descriptor(files[0].clone()),
        })
    }

    /// POST `body` and parse the JSON envelope regardless of HTTP status.
    async fn post_envelope(&self, url: &str, body: &Value) -> AppResult<Value> {
        let reply = self.transport.post_json(url, body).await?;
        reply.json().map_err(|_| AppError::Api {
            status: Some(reply.status),
            message: format!("Unexpected response from {} (HTTP {})", url, reply.status),
        })
    }
}

fn code_of(data: &Value) -> Option<i64> {
    data.get("code").and_then(Value::as_i64)
}

fn message_of(data: &Value) -> Option<&str> {
    data.get("msg").and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn failed_reason(data: &Value) -> String {
    let reason = data.get("data").and_then(|d| d.get("failedReason"));
    let field = |key: &str| {
        reason
            .and_then(|r| r.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    field("exception_message")
        .or_else(|| field("node_name"))
        .or_else(|| message_of(data))
        .unwrap_or("Task failed")
        .to_string()
}

/// Message for a non-2xx reply: `msg` or `message` from a JSON body, else
/// the raw text, else the status line.
fn http_error_message(reply: &HttpReply) -> String {
    if let Ok(body) = reply.json() {
        let field = ["msg", "message"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()));
        if let Some(message) = field {
            return message.to_string();
        }
    }
    if !reply.body.trim().is_empty() {
        return reply.body.clone();
    }
    format!("HTTP {}", reply.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_reason_prefers_exception_message() {
        let data = json!({"code": 805, "msg": "m", "data": {"failedReason": {"exception_message": "OOM", "node_name": "KSampler"}}});
        assert_eq!(failed_reason(&data), "OOM");
        let data = json!({"code": 805, "msg": "m", "data": {"failedReason": {"node_name": "KSampler"}}});
        assert_eq!(failed_reason(&data), "KSampler");
        assert_eq!(failed_reason(&json!({"code": 805})), "Task failed");
    }

    #[test]
    fn http_error_message_falls_back_to_text() {
        assert_eq!(http_error_message(&HttpReply::new(500, r#"{"msg":"busy"}"#)), "busy");
        assert_eq!(http_error_message(&HttpReply::new(502, "Bad Gateway")), "Bad Gateway");
        assert_eq!(http_error_message(&HttpReply::new(503, "")), "HTTP 503");
    }
}
