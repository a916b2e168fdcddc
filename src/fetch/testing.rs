//! In-memory transport for driving the pipeline in tests

use super::Transport;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// Serves canned JSON per URL; unknown URLs answer with HTTP 404
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<String>>,
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: impl Into<String>, payload: Value) {
        self.responses.lock().unwrap().insert(url.into(), payload);
    }

    /// Run `hook` when `url` is requested, before answering
    pub fn on_request(&self, url: impl Into<String>, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.hooks.lock().unwrap().push((url.into(), Box::new(hook)));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|r| r == url)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.requests.lock().unwrap().push(url.to_string());
        for (target, hook) in self.hooks.lock().unwrap().iter() {
            if target == url {
                hook(url);
            }
        }

        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Fetch {
                label: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}
