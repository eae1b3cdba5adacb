#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tryon_proxy::runninghub::transport::{HttpReply, MultipartUpload, Transport, TransportError};
use tryon_proxy::{Config, RunningHubClient};

pub const BASE: &str = "http://rh.test";
pub const API_KEY: &str = "test-key";
pub const WEBAPP_ID: &str = "app-1";

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

pub fn submit_url() -> String {
    url("/task/openapi/ai-app/run")
}

pub fn status_url() -> String {
    url("/task/openapi/status")
}

pub fn outputs_url() -> String {
    url("/task/openapi/outputs")
}

pub fn account_url() -> String {
    url("/uc/openapi/accountStatus")
}

pub fn upload_url() -> String {
    url("/task/openapi/upload")
}

pub fn test_config() -> Config {
    Config::for_base_url(BASE, API_KEY, WEBAPP_ID)
}

#[derive(Clone, Debug)]
pub enum Scripted {
    Reply(HttpReply),
    Fail(String),
}

pub fn ok(body: Value) -> Scripted {
    Scripted::Reply(HttpReply::new(200, body.to_string()))
}

pub fn reply(status: u16, body: &str) -> Scripted {
    Scripted::Reply(HttpReply::new(status, body))
}

pub fn fail(message: &str) -> Scripted {
    Scripted::Fail(message.to_string())
}

#[derive(Clone, Debug)]
pub struct Call {
    pub url: String,
    pub json: Option<Value>,
    pub upload: Option<MultipartUpload>,
}

/// Replays scripted replies per URL. The last entry of a queue repeats.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeTransport::default())
    }

    pub fn script(&self, url: impl Into<String>, replies: Vec<Scripted>) {
        self.routes.lock().unwrap().insert(url.into(), replies.into());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.url == url).collect()
    }

    fn next(&self, url: &str) -> Result<HttpReply, TransportError> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(url)
            .ok_or_else(|| TransportError(format!("no route scripted for {}", url)))?;
        let step = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        match step {
            Some(Scripted::Reply(r)) => Ok(r),
            Some(Scripted::Fail(m)) => Err(TransportError(m)),
            None => Err(TransportError(format!("empty script for {}", url))),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError> {
        self.calls.lock().unwrap().push(Call { url: url.to_string(), json: Some(body.clone()), upload: None });
        self.next(url)
    }

    async fn post_multipart(&self, url: &str, upload: MultipartUpload) -> Result<HttpReply, TransportError> {
        self.calls.lock().unwrap().push(Call { url: url.to_string(), json: None, upload: Some(upload) });
        self.next(url)
    }
}

pub fn client_with(config: Config, fake: &Arc<FakeTransport>) -> RunningHubClient {
    RunningHubClient::with_transport(config, fake.clone())
}

pub fn client(fake: &Arc<FakeTransport>) -> RunningHubClient {
    client_with(test_config(), fake)
}
