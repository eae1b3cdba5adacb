//! HTTP seam used by the client.
//!
//! A `Transport` only reports whether a response arrived. Any status code is
//! returned as an `HttpReply`; a `TransportError` means the request never
//! reached the server (DNS, connect, TLS, timeout).
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpReply { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// A single file plus text fields, posted as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub file_field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError>;

    async fn post_multipart(&self, url: &str, upload: MultipartUpload) -> Result<HttpReply, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(ReqwestTransport { client })
    }

    async fn read_reply(response: reqwest::Response) -> Result<HttpReply, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError> {
        let response = self.client.post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Self::read_reply(response).await
    }

    async fn post_multipart(&self, url: &str, upload: MultipartUpload) -> Result<HttpReply, TransportError> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| TransportError(e.to_string()))?;
        let mut form = Form::new().part(upload.file_field, part);
        for (name, value) in upload.fields {
            form = form.text(name, value);
        }
        let response = self.client.post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Self::read_reply(response).await
    }
}
