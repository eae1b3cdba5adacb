//! Job invocation payloads for the try-on workflow.
//!
//! The workflow exposes three inputs: the subject image, a quality mode
//! selector and the clothing image. Node ids are fixed by the published app.
use crate::config::Config;
use crate::runninghub::types::{AssetReference, JobRequest, NodeInfo};

pub const MODEL_IMAGE_NODE: &str = "80";
pub const MODE_NODE: &str = "102";
pub const CLOTHING_IMAGE_NODE: &str = "104";

/// Mode selector value: "1" is fine, "2" is fast.
pub const FAST_MODE: &str = "2";

pub struct JobBuilder {
    webapp_id: String,
    api_key: String,
}

impl JobBuilder {
    pub fn new(config: &Config) -> Self {
        JobBuilder { webapp_id: config.webapp_id.clone(), api_key: config.api_key.clone() }
    }

    /// Bind both asset references into a fresh request.
    pub fn build(&self, model: &AssetReference, clothing: &AssetReference) -> JobRequest {
        JobRequest {
            webapp_id: self.webapp_id.clone(),
            api_key: self.api_key.clone(),
            node_info_list: vec![
                node(MODEL_IMAGE_NODE, "image", model.as_str(), "Upload model"),
                node(MODE_NODE, "value", FAST_MODE, "1 Fine 2 Fast"),
                node(CLOTHING_IMAGE_NODE, "image", clothing.as_str(), "Upload clothing"),
            ],
        }
    }
}

fn node(node_id: &str, field_name: &str, field_value: &str, description: &str) -> NodeInfo {
    NodeInfo {
        node_id: node_id.to_string(),
        field_name: field_name.to_string(),
        field_value: field_value.to_string(),
        description: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_has_fixed_bindings() {
        let config = Config::for_base_url("http://stub", "key-1", "app-7");
        let job = JobBuilder::new(&config).build(&AssetReference("m.png".into()), &AssetReference("c.png".into()));
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value, json!({
            "webappId": "app-7",
            "apiKey": "key-1",
            "nodeInfoList": [
                {"nodeId": "80", "fieldName": "image", "fieldValue": "m.png", "description": "Upload model"},
                {"nodeId": "102", "fieldName": "value", "fieldValue": "2", "description": "1 Fine 2 Fast"},
                {"nodeId": "104", "fieldName": "image", "fieldValue": "c.png", "description": "Upload clothing"}
            ]
        }));
    }
}
