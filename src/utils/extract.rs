//! Classification of job responses and image URL extraction.
//!
//! The service returns results in several shapes depending on which code path
//! served the request. Probes run in a fixed order and the first one whose
//! key is present wins, even when the value under that key turns out not to
//! hold a URL. Reordering the rules changes which field is picked for payloads
//! that carry more than one of them.
use serde_json::Value;

use crate::error::AppError;
use crate::runninghub::types::{TaskHandle, TaskStatus};

/// Business codes that mean "ok".
const SUCCESS_CODES: [i64; 2] = [0, 200];

/// Strings with this prefix are taken as URLs when scanning loose values.
const URL_PREFIX: &str = "http";

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Direct(String),
    Async(TaskHandle),
    Failed(Failure),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Non-success business code on the response envelope.
    Rejected { code: i64, message: String },
    /// The task itself reported failure.
    Task(String),
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::Rejected { message, .. } | Failure::Task(message) => message,
        }
    }

    pub fn into_error(self) -> AppError {
        match self {
            Failure::Rejected { message, .. } => AppError::api(message),
            Failure::Task(message) => AppError::TaskFailed(message),
        }
    }
}

/// A probe fires when its key is present; the inner option is the URL it
/// managed to read from that key.
type Rule = fn(&Value) -> Option<Option<String>>;

/// Probes applied to the `data` container, in order.
const CONTAINER_RULES: &[(&str, Rule)] = &[
    ("resultUrl", rule_result_url),
    ("result", rule_result),
    ("url", rule_url),
    ("imageUrl", rule_image_url),
    ("image", rule_image),
    ("array", rule_array),
    ("string", rule_bare_string),
];

/// Probes applied to a container that already reports a finished task.
const FINISHED_TASK_RULES: &[(&str, Rule)] = &[
    ("resultUrl", rule_result_url),
    ("result", rule_result),
    ("url", rule_url),
];

/// Probes applied to the top-level envelope when `data` yielded nothing.
const TOP_LEVEL_RULES: &[(&str, Rule)] = &[
    ("resultUrl", rule_result_url),
    ("url", rule_url),
    ("imageUrl", rule_image_url),
    ("result", rule_result),
    ("image", rule_image),
];

/// Decide what a job invocation response means.
pub fn classify(body: &Value) -> ExtractionResult {
    if let Some(failure) = business_failure(body) {
        return ExtractionResult::Failed(failure);
    }

    if let Some(data) = present(body, "data") {
        match first_match(data, CONTAINER_RULES) {
            Some(Some(url)) => return ExtractionResult::Direct(url),
            Some(None) => {}
            None => {
                if present(data, "taskId").is_some() || present(data, "taskStatus").is_some() {
                    if let Some(result) = classify_task(body, data) {
                        return result;
                    }
                }
            }
        }
    }

    match first_match(body, TOP_LEVEL_RULES) {
        Some(Some(url)) => ExtractionResult::Direct(url),
        _ => ExtractionResult::NotFound,
    }
}

/// URL from a structured output descriptor returned by the outputs endpoint.
pub fn extract_output_url(output: &Value) -> Option<String> {
    if let Some(s) = output.as_str() {
        return s.starts_with(URL_PREFIX).then(|| s.to_string());
    }
    ["resultUrl", "url", "imageUrl"]
        .iter()
        .find_map(|k| present(output, k).and_then(url_text))
        .or_else(|| present(output, "result").and_then(|r| string_or_nested(r, &["url", "resultUrl"])))
        .or_else(|| present(output, "output").and_then(|o| string_or_nested(o, &["url", "resultUrl", "filename"])))
}

/// Human-readable reason from a possibly JSON-encoded error message.
///
/// Prefers `error.message`/`error.details`, then the first entry of
/// `node_errors`. Plain text is returned unchanged.
pub fn unwrap_error_message(raw: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    let from_error = present(&parsed, "error").and_then(|e| {
        present(e, "message")
            .and_then(url_text)
            .or_else(|| present(e, "details").and_then(url_text))
    });
    if let Some(message) = from_error {
        return message;
    }
    let from_nodes = parsed
        .get("node_errors")
        .and_then(Value::as_object)
        .and_then(|nodes| nodes.values().next())
        .and_then(|node| node.get("errors"))
        .and_then(|errors| errors.get(0))
        .and_then(|first| {
            present(first, "details")
                .and_then(url_text)
                .or_else(|| present(first, "message").and_then(url_text))
        });
    from_nodes.unwrap_or_else(|| raw.to_string())
}

/// Node count from `promptTips.outputs_to_execute`; `promptTips` may be an
/// object or a JSON-encoded string.
pub fn total_nodes(data: &Value) -> Option<usize> {
    let tips = present(data, "promptTips")?;
    let parsed;
    let tips = match tips {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).ok()?;
            &parsed
        }
        other => other,
    };
    tips.get("outputs_to_execute")?.as_array().map(Vec::len)
}

fn business_failure(body: &Value) -> Option<Failure> {
    let code = body.get("code")?.as_i64()?;
    if SUCCESS_CODES.contains(&code) {
        return None;
    }
    let raw = present(body, "msg")
        .and_then(url_text)
        .or_else(|| present(body, "message").and_then(url_text))
        .unwrap_or_else(|| "Unknown error".to_string());
    Some(Failure::Rejected { code, message: unwrap_error_message(&raw) })
}

fn classify_task(body: &Value, data: &Value) -> Option<ExtractionResult> {
    let status = present(data, "taskStatus")
        .and_then(Value::as_str)
        .map(TaskStatus::parse)
        .unwrap_or(TaskStatus::Unknown);
    match status {
        TaskStatus::Success => match first_match(data, FINISHED_TASK_RULES) {
            Some(Some(url)) => Some(ExtractionResult::Direct(url)),
            _ => None,
        },
        TaskStatus::Queued | TaskStatus::Running => {
            let Some(task_id) = present(data, "taskId").and_then(scalar_text) else {
                return Some(ExtractionResult::Failed(Failure::Task(
                    "Task was accepted but the response carries no taskId".to_string(),
                )));
            };
            Some(ExtractionResult::Async(TaskHandle {
                task_id,
                client_id: present(data, "clientId").and_then(scalar_text),
                net_wss_url: present(data, "netWssUrl").and_then(url_text),
                total_nodes: total_nodes(data),
            }))
        }
        TaskStatus::Failed => {
            let message = present(data, "error")
                .and_then(url_text)
                .or_else(|| present(body, "msg").and_then(url_text))
                .unwrap_or_else(|| "Task failed".to_string());
            Some(ExtractionResult::Failed(Failure::Task(message)))
        }
        TaskStatus::Unknown => None,
    }
}

fn first_match(value: &Value, rules: &[(&str, Rule)]) -> Option<Option<String>> {
    rules.iter().find_map(|(name, rule)| {
        let hit = rule(value);
        if let Some(found) = &hit {
            tracing::debug!(rule = %name, resolved = found.is_some(), "result probe matched");
        }
        hit
    })
}

fn rule_result_url(v: &Value) -> Option<Option<String>> {
    present(v, "resultUrl").map(url_text)
}

fn rule_result(v: &Value) -> Option<Option<String>> {
    present(v, "result").map(|r| string_or_nested(r, &["url", "resultUrl"]))
}

fn rule_url(v: &Value) -> Option<Option<String>> {
    present(v, "url").map(url_text)
}

fn rule_image_url(v: &Value) -> Option<Option<String>> {
    present(v, "imageUrl").map(url_text)
}

fn rule_image(v: &Value) -> Option<Option<String>> {
    present(v, "image").map(|i| string_or_nested(i, &["url", "resultUrl"]))
}

fn rule_array(v: &Value) -> Option<Option<String>> {
    const ITEM_KEYS: [&str; 3] = ["url", "resultUrl", "imageUrl"];
    let items = v.as_array().filter(|a| !a.is_empty())?;
    let item_url = |item: &Value| ITEM_KEYS.iter().find_map(|k| present(item, k)).and_then(url_text);

    let first = &items[0];
    if let Some(s) = first.as_str() {
        return Some(non_empty(s));
    }
    if let Some(url) = item_url(first) {
        return Some(Some(url));
    }
    let scanned = items.iter().find_map(|item| match item {
        Value::String(s) if s.starts_with(URL_PREFIX) => Some(s.clone()),
        Value::Object(_) => item_url(item),
        _ => None,
    });
    Some(scanned)
}

fn rule_bare_string(v: &Value) -> Option<Option<String>> {
    v.as_str()
        .filter(|s| s.starts_with(URL_PREFIX))
        .map(|s| Some(s.to_string()))
}

/// `v` itself when it is a string, otherwise the first present key of `keys`.
fn string_or_nested(v: &Value, keys: &[&str]) -> Option<String> {
    match v {
        Value::String(s) => non_empty(s),
        _ => keys.iter().find_map(|k| present(v, k)).and_then(url_text),
    }
}

/// Field lookup that skips null, false, zero and empty strings.
fn present<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.get(key).filter(|inner| truthy(inner))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn url_text(v: &Value) -> Option<String> {
    v.as_str().and_then(non_empty)
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn direct(url: &str) -> ExtractionResult {
        ExtractionResult::Direct(url.to_string())
    }

    #[test]
    fn result_url_is_returned_directly() {
        let body = json!({"code": 0, "data": {"resultUrl": "https://x/y.png"}});
        assert_eq!(classify(&body), direct("https://x/y.png"));
    }

    #[test]
    fn running_task_becomes_async_handle() {
        let body = json!({"code": 0, "data": {"taskId": "T1", "taskStatus": "RUNNING"}});
        assert_eq!(classify(&body), ExtractionResult::Async(TaskHandle::new("T1")));
    }

    #[test]
    fn nested_json_error_message_is_unwrapped() {
        let body = json!({"code": 433, "msg": "{\"error\":{\"message\":\"bad node\"}}"});
        match classify(&body) {
            ExtractionResult::Failed(f) => {
                assert_eq!(f.message(), "bad node");
                assert!(matches!(f, Failure::Rejected { code: 433, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn node_errors_used_when_error_object_is_silent() {
        let raw = r#"{"error":{"type":"x"},"node_errors":{"80":{"errors":[{"details":"image missing","message":"m"}]},"81":{"errors":[{"details":"other"}]}}}"#;
        assert_eq!(unwrap_error_message(raw), "image missing");
        assert_eq!(unwrap_error_message("plain text"), "plain text");
    }

    #[test]
    fn code_200_is_success() {
        let body = json!({"code": 200, "data": {"url": "https://h/a.png"}});
        assert_eq!(classify(&body), direct("https://h/a.png"));
    }

    #[test]
    fn earlier_rule_wins_over_later_fields() {
        let body = json!({"code": 0, "data": {"imageUrl": "https://h/img.png", "url": "https://h/url.png"}});
        assert_eq!(classify(&body), direct("https://h/url.png"));
    }

    #[test]
    fn matched_key_without_url_falls_to_top_level() {
        // `result` fires but holds no URL; `imageUrl` in data is not consulted.
        let body = json!({
            "code": 0,
            "data": {"result": {"kind": "x"}, "imageUrl": "https://h/skipped.png"},
            "url": "https://h/top.png"
        });
        assert_eq!(classify(&body), direct("https://h/top.png"));
    }

    #[test]
    fn nested_result_and_image_objects() {
        let body = json!({"code": 0, "data": {"result": {"resultUrl": "https://h/r.png"}}});
        assert_eq!(classify(&body), direct("https://h/r.png"));
        let body = json!({"code": 0, "data": {"image": {"url": "https://h/i.png"}}});
        assert_eq!(classify(&body), direct("https://h/i.png"));
    }

    #[test]
    fn arrays_are_scanned() {
        let body = json!({"code": 0, "data": ["https://h/0.png"]});
        assert_eq!(classify(&body), direct("https://h/0.png"));
        let body = json!({"code": 0, "data": [{"name": "a"}, 3, "ftp://no", {"imageUrl": "https://h/2.png"}]});
        assert_eq!(classify(&body), direct("https://h/2.png"));
        let body = json!({"code": 0, "data": [{"name": "a"}]});
        assert_eq!(classify(&body), ExtractionResult::NotFound);
    }

    #[test]
    fn bare_string_needs_scheme() {
        assert_eq!(classify(&json!({"code": 0, "data": "https://h/s.png"})), direct("https://h/s.png"));
        assert_eq!(classify(&json!({"code": 0, "data": "pending"})), ExtractionResult::NotFound);
    }

    #[test]
    fn finished_task_reads_result_fields() {
        let body = json!({"data": {"taskId": "T9", "taskStatus": "SUCCESS", "outputs": []}, "resultUrl": "https://h/top.png"});
        assert_eq!(classify(&body), direct("https://h/top.png"));
    }

    #[test]
    fn failed_task_uses_error_text() {
        let body = json!({"code": 0, "msg": "fallback", "data": {"taskId": "T2", "taskStatus": "FAILED", "error": "out of memory"}});
        assert_eq!(classify(&body), ExtractionResult::Failed(Failure::Task("out of memory".into())));
        let body = json!({"code": 0, "msg": "fallback", "data": {"taskId": "T2", "taskStatus": "FAILED"}});
        assert_eq!(classify(&body), ExtractionResult::Failed(Failure::Task("fallback".into())));
    }

    #[test]
    fn created_task_carries_metadata() {
        let body = json!({"code": 0, "data": {
            "taskId": 1234, "clientId": "c-1", "taskStatus": "CREATE",
            "netWssUrl": "wss://h/ws", "promptTips": "{\"outputs_to_execute\":[\"7\",\"9\"]}"
        }});
        let ExtractionResult::Async(handle) = classify(&body) else { panic!("expected async") };
        assert_eq!(handle.task_id, "1234");
        assert_eq!(handle.client_id.as_deref(), Some("c-1"));
        assert_eq!(handle.net_wss_url.as_deref(), Some("wss://h/ws"));
        assert_eq!(handle.total_nodes, Some(2));
    }

    #[test]
    fn nothing_recognizable_is_not_found() {
        assert_eq!(classify(&json!({"code": 0, "data": {"foo": 1}})), ExtractionResult::NotFound);
        assert_eq!(classify(&json!({})), ExtractionResult::NotFound);
    }

    #[test]
    fn output_descriptor_probes() {
        assert_eq!(extract_output_url(&json!({"url": "https://h/u.png"})).as_deref(), Some("https://h/u.png"));
        assert_eq!(
            extract_output_url(&json!({"output": {"filename": "https://h/f.png"}})).as_deref(),
            Some("https://h/f.png")
        );
        assert_eq!(extract_output_url(&json!({"fileType": "png"})), None);
        assert_eq!(extract_output_url(&json!("not-a-url")), None);
    }
}
