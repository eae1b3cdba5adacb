//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Endpoint defaults point at the public RunningHub API; the
//! credentials (`API_KEY`, `WEBAPP_ID`) have no default.
use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv;

use crate::error::{AppError, AppResult};

const DEFAULT_API_URL: &str = "https://www.runninghub.ai/task/openapi/ai-app/run";
const DEFAULT_STATUS_URL: &str = "https://www.runninghub.cn/task/openapi/status";
const DEFAULT_OUTPUTS_URL: &str = "https://www.runninghub.cn/task/openapi/outputs";
const DEFAULT_ACCOUNT_STATUS_URL: &str = "https://www.runninghub.cn/uc/openapi/accountStatus";
const DEFAULT_UPLOAD_URLS: &str =
    "https://www.runninghub.ai/task/openapi/upload,https://www.runninghub.cn/task/openapi/upload";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub webapp_id: String,
    pub api_key: String,
    pub status_url: String,
    pub outputs_url: String,
    pub account_status_url: String,
    /// Tried in order; the first that yields a reference wins.
    pub upload_urls: Vec<String>,
    pub max_concurrent_tasks: u32,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub max_task_duration_ms: u64,
    pub submit_max_attempts: u32,
    pub submit_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub api_host: String,
    pub api_port: String,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        let config = Config {
            api_url: var_or("API_URL", DEFAULT_API_URL),
            webapp_id: var_or("WEBAPP_ID", ""),
            api_key: var_or("API_KEY", ""),
            status_url: var_or("STATUS_URL", DEFAULT_STATUS_URL),
            outputs_url: var_or("OUTPUTS_URL", DEFAULT_OUTPUTS_URL),
            account_status_url: var_or("ACCOUNT_STATUS_URL", DEFAULT_ACCOUNT_STATUS_URL),
            upload_urls: split_urls(&var_or("UPLOAD_URLS", DEFAULT_UPLOAD_URLS)),
            max_concurrent_tasks: parse_var("MAX_CONCURRENT_TASKS", 3)?,
            poll_max_attempts: parse_var("POLL_MAX_ATTEMPTS", 120)?,
            poll_interval_ms: parse_var("POLL_INTERVAL_MS", 2000)?,
            max_task_duration_ms: parse_var("MAX_TASK_DURATION_MS", 180_000)?,
            submit_max_attempts: parse_var("SUBMIT_MAX_ATTEMPTS", 3)?,
            submit_backoff_ms: parse_var("SUBMIT_BACKOFF_MS", 1000)?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 60)?,
            api_host: var_or("API_HOST", "127.0.0.1"),
            api_port: var_or("API_PORT", "8190"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration pointing every endpoint at `base_url`, for local stubs.
    pub fn for_base_url(base_url: &str, api_key: &str, webapp_id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Config {
            api_url: format!("{}/task/openapi/ai-app/run", base),
            webapp_id: webapp_id.to_string(),
            api_key: api_key.to_string(),
            status_url: format!("{}/task/openapi/status", base),
            outputs_url: format!("{}/task/openapi/outputs", base),
            account_status_url: format!("{}/uc/openapi/accountStatus", base),
            upload_urls: vec![format!("{}/task/openapi/upload", base)],
            max_concurrent_tasks: 3,
            poll_max_attempts: 120,
            poll_interval_ms: 2000,
            max_task_duration_ms: 180_000,
            submit_max_attempts: 3,
            submit_backoff_ms: 1000,
            request_timeout_secs: 60,
            api_host: "127.0.0.1".to_string(),
            api_port: "8190".to_string(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() {
            missing.push("API_KEY");
        }
        if self.webapp_id.trim().is_empty() {
            missing.push("WEBAPP_ID");
        }
        if !missing.is_empty() {
            return Err(AppError::Config(format!("missing required environment variables: {}", missing.join(", "))));
        }
        if self.submit_max_attempts == 0 || self.poll_max_attempts == 0 {
            return Err(AppError::Config("attempt counts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn print_env_vars() {
        for key in ["API_URL", "WEBAPP_ID", "STATUS_URL", "OUTPUTS_URL", "ACCOUNT_STATUS_URL", "UPLOAD_URLS", "API_HOST", "API_PORT"] {
            println!("{}: {}", key, env::var(key).unwrap_or_else(|_| "<unset>".to_string()));
        }
        let key_state = if env::var("API_KEY").map(|v| !v.is_empty()).unwrap_or(false) { "***MASKED***" } else { "<unset>" };
        println!("API_KEY: {}", key_state);
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| AppError::Config(format!("{} is not a valid number: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
