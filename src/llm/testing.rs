//! In-memory model client for exercising the pipelines without a network.

use super::client::{BoxFuture, ModelClient, ModelRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Replays scripted responses per model name.
///
/// Each model has a queue of outcomes; the last outcome repeats once the
/// queue is down to one entry. Unscripted models fail.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    script: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    listing: Option<Vec<String>>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<ModelRequest>>,
    list_calls: Mutex<usize>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(self, model: &str, outcome: Result<String, String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub(crate) fn reply(self, model: &str, content: &str) -> Self {
        self.push(model, Ok(content.to_string()))
    }

    pub(crate) fn fail(self, model: &str, message: &str) -> Self {
        self.push(model, Err(message.to_string()))
    }

    pub(crate) fn listing(mut self, models: &[&str]) -> Self {
        self.listing = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    /// Model names in call order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

impl ModelClient for ScriptedClient {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        request: &'a ModelRequest,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(model.to_string());
            self.requests.lock().unwrap().push(request.clone());

            let outcome = {
                let mut script = self.script.lock().unwrap();
                match script.get_mut(model) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };
            match outcome {
                Some(Ok(content)) => Ok(content),
                Some(Err(message)) => Err(anyhow::anyhow!(message)),
                None => Err(anyhow::anyhow!("unknown model {}", model)),
            }
        })
    }

    fn list_models<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<Vec<String>>> {
        Box::pin(async move {
            *self.list_calls.lock().unwrap() += 1;
            self.listing
                .clone()
                .ok_or_else(|| anyhow::anyhow!("listing endpoint unavailable"))
        })
    }
}
