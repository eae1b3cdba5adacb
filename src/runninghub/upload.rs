//! Asset upload with endpoint fallback.
//!
//! Each configured upload endpoint is tried in order. When none returns a
//! usable reference the asset is identified by a SHA-256 digest of its bytes
//! plus its extension, which never touches the network.
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::runninghub::client::RunningHubClient;
use crate::runninghub::transport::MultipartUpload;
use crate::runninghub::types::{Asset, AssetReference};

const FILE_FIELD: &str = "file";
const FILE_TYPE: &str = "image";

/// Reference keys seen in legacy upload responses, in preference order.
const TOP_LEVEL_KEYS: &[&str] = &["fileHash", "hash", "file_id", "id", "fileName"];
const NESTED_KEYS: &[&str] = &["fileHash", "hash", "file_id", "fileName"];

impl RunningHubClient {
    /// Upload `asset` and return the reference the job API accepts for it.
    /// Never fails: falls back to `local_reference`.
    pub async fn upload_asset(&self, asset: &Asset) -> AssetReference {
        for endpoint in &self.config().upload_urls {
            let upload = MultipartUpload {
                file_field: FILE_FIELD.to_string(),
                file_name: asset.file_name.clone(),
                mime_type: asset.mime_type.clone(),
                bytes: asset.bytes.clone(),
                fields: vec![
                    ("fileType".to_string(), FILE_TYPE.to_string()),
                    ("apiKey".to_string(), self.config().api_key.clone()),
                ],
            };
            let reply = match self.transport().post_multipart(endpoint, upload).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::info!("Upload endpoint {} failed: {}", endpoint, e);
                    continue;
                }
            };
            if !reply.is_success() {
                tracing::info!("Upload endpoint {} returned {}: {}", endpoint, reply.status, reply.body);
                continue;
            }
            match reply.json() {
                Ok(body) => {
                    tracing::debug!("Upload response: {}", body);
                    if let Some(reference) = reference_from_body(&body) {
                        tracing::info!("Uploaded {} as {}", asset.file_name, reference);
                        return reference;
                    }
                    tracing::info!("Upload endpoint {} returned no file reference", endpoint);
                }
                Err(e) => tracing::info!("Upload endpoint {} returned unreadable body: {}", endpoint, e),
            }
        }

        tracing::info!("Upload endpoints unavailable, identifying {} by content hash", asset.file_name);
        local_reference(asset)
    }
}

/// Reference from an upload response body.
pub fn reference_from_body(body: &Value) -> Option<AssetReference> {
    let text = |v: &Value| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let data = body.get("data");

    if body.get("code").and_then(Value::as_i64) == Some(0) {
        if let Some(name) = data.and_then(|d| d.get("fileName")).and_then(text) {
            return Some(AssetReference(name));
        }
    }
    if let Some(r) = TOP_LEVEL_KEYS.iter().find_map(|k| body.get(*k).and_then(text)) {
        return Some(AssetReference(r));
    }
    if let Some(r) = data.and_then(|d| NESTED_KEYS.iter().find_map(|k| d.get(*k).and_then(text))) {
        return Some(AssetReference(r));
    }
    body.as_str().filter(|s| !s.is_empty()).map(|s| AssetReference(s.to_string()))
}

/// Hex SHA-256 of the asset bytes, with the original extension appended.
pub fn local_reference(asset: &Asset) -> AssetReference {
    let mut hasher = Sha256::new();
    hasher.update(&asset.bytes);
    let digest = hex::encode(hasher.finalize());
    match asset.extension() {
        Some(ext) => AssetReference(format!("{}.{}", digest, ext)),
        // No extension: the bare digest, not `<digest>.<file name>`.
        None => AssetReference(digest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_field_first() {
        let body = json!({"code": 0, "data": {"fileName": "api/abc.png", "fileHash": "h"}});
        assert_eq!(reference_from_body(&body), Some(AssetReference("api/abc.png".into())));
    }

    #[test]
    fn legacy_fields_top_level_then_nested() {
        assert_eq!(reference_from_body(&json!({"hash": "h1", "id": 5})), Some(AssetReference("h1".into())));
        assert_eq!(reference_from_body(&json!({"id": 5})), Some(AssetReference("5".into())));
        assert_eq!(
            reference_from_body(&json!({"code": 1, "data": {"file_id": "f9"}})),
            Some(AssetReference("f9".into()))
        );
        assert_eq!(reference_from_body(&json!("raw-ref")), Some(AssetReference("raw-ref".into())));
        assert_eq!(reference_from_body(&json!({"code": 0, "data": {}})), None);
    }

    #[test]
    fn local_reference_is_deterministic() {
        let a = Asset::new("model.png", b"same bytes".to_vec());
        let b = Asset::new("other.png", b"same bytes".to_vec());
        assert_eq!(local_reference(&a), local_reference(&b));
        let r = local_reference(&a);
        assert!(r.as_str().ends_with(".png"));
        assert_eq!(r.as_str().len(), 64 + 4);
        assert_ne!(local_reference(&Asset::new("x.png", b"different".to_vec())), r);
    }

    #[test]
    fn local_reference_without_extension_is_bare_digest() {
        let r = local_reference(&Asset::new("photo", b"abc".to_vec()));
        assert_eq!(r.as_str(), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
