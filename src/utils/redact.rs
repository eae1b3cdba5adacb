use serde_json::{Map, Value};

const SENSITIVE_KEYS: &[&str] = &["apikey", "api_key", "password", "token", "secret"];

pub const MASK: &str = "***MASKED***";

/// Copy of `value` with credential-like fields replaced by `MASK`.
///
/// A key is sensitive when its lowercase form contains any of
/// `SENSITIVE_KEYS`. Objects and arrays are walked recursively.
pub fn masked(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map.iter() {
                let lower = k.to_ascii_lowercase();
                if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                    out.insert(k.clone(), Value::String(MASK.to_string()));
                } else {
                    out.insert(k.clone(), masked(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(masked).collect()),
        other => other.clone(),
    }
}

pub fn log_payload(label: &str, payload: &Value) {
    tracing::debug!(target: "payload", "{}: {}", label, masked(payload));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_nested_credentials() {
        let v = json!({
            "apiKey": "k1",
            "webappId": "42",
            "nested": [{"API_KEY": "k2", "secretToken": 7, "fieldValue": "x.png"}]
        });
        let out = masked(&v);
        assert_eq!(out["apiKey"], MASK);
        assert_eq!(out["webappId"], "42");
        assert_eq!(out["nested"][0]["API_KEY"], MASK);
        assert_eq!(out["nested"][0]["secretToken"], MASK);
        assert_eq!(out["nested"][0]["fieldValue"], "x.png");
    }
}
