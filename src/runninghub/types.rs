//! Data shapes exchanged with the RunningHub task API.
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// A binary image provided by the caller, held in memory until uploaded.
#[derive(Debug, Clone)]
pub struct Asset {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for_name(&file_name).to_string();
        Asset { file_name, mime_type, bytes }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::InvalidInput(format!("Not a file path: {}", path.display())))?;
        Ok(Asset::new(file_name, bytes))
    }

    /// Extension after the last dot, if the name has one.
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

fn mime_for_name(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Opaque server-side identifier for an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetReference(pub String);

impl AssetReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One field assignment in a job invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: String,
    pub field_name: String,
    pub field_value: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub webapp_id: String,
    pub api_key: String,
    pub node_info_list: Vec<NodeInfo>,
}

/// Handle of an accepted job that has not finished yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
    pub client_id: Option<String>,
    /// Push-notification endpoint advertised by the service. Not consumed.
    pub net_wss_url: Option<String>,
    /// Number of output nodes the service reported it will execute.
    pub total_nodes: Option<usize>,
}

impl TaskHandle {
    pub fn new(task_id: impl Into<String>) -> Self {
        TaskHandle { task_id: task_id.into(), client_id: None, net_wss_url: None, total_nodes: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Failed,
    Unknown,
}

impl TaskStatus {
    /// Parse a status word as reported by the service, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QUEUED" | "CREATE" => TaskStatus::Queued,
            "RUNNING" => TaskStatus::Running,
            "SUCCESS" | "COMPLETED" => TaskStatus::Success,
            "FAILED" => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    pub fn pending_label(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            _ => "running",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Estimated completion, `value` out of `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub value: u32,
    pub max: u32,
}

impl Progress {
    pub const MAX: u32 = 100;

    pub fn zero() -> Self {
        Progress { value: 0, max: Self::MAX }
    }

    pub fn complete() -> Self {
        Progress { value: Self::MAX, max: Self::MAX }
    }

    /// Percentage from an elapsed/total ratio, held below 100 until completion.
    pub fn estimated(elapsed_ms: u128, total_ms: u128) -> Self {
        let total = total_ms.max(1);
        let percent = (elapsed_ms.saturating_mul(Self::MAX as u128) / total).min((Self::MAX - 1) as u128);
        Progress { value: percent as u32, max: Self::MAX }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Progress::zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub remain_coins: Option<String>,
    pub current_task_counts: u32,
    pub remain_money: Option<String>,
    pub currency: Option<String>,
    pub api_type: Option<String>,
}

impl AccountStatus {
    /// Build from the `data` object of an account status response.
    /// Numeric fields may arrive as numbers or strings.
    pub fn from_data(data: &Value) -> Self {
        let text = |key: &str| match data.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let current_task_counts = match data.get("currentTaskCounts") {
            Some(Value::Number(n)) => count_from_number(n),
            Some(Value::String(s)) => leading_int(s),
            _ => 0,
        };
        AccountStatus {
            remain_coins: text("remainCoins"),
            current_task_counts,
            remain_money: text("remainMoney"),
            currency: text("currency"),
            api_type: text("apiType"),
        }
    }
}

/// Whole-number count from a JSON number. Values that do not fit read as
/// `u32::MAX` so the quota check refuses rather than passes.
fn count_from_number(n: &serde_json::Number) -> u32 {
    if let Some(v) = n.as_u64() {
        return u32::try_from(v).unwrap_or(u32::MAX);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f <= u32::MAX as f64 => f.ceil() as u32,
        _ => u32::MAX,
    }
}

/// Integer prefix of a string, 0 when there is none.
fn leading_int(s: &str) -> u32 {
    let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// What the outputs endpoint yielded for a finished task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Url(String),
    /// First file descriptor, returned as-is when it has no `fileUrl`.
    Descriptor(Value),
}
