//! Test doubles shared by this crate's unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use nestgram_core::{ApiResult, BotApi, Update, UpdateHandler};

/// Replays scripted results per method and records every call.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    calls: Mutex<Vec<(String, Value)>>,
    script: Mutex<HashMap<String, VecDeque<ApiResult<Value>>>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the next result of `method`.
    pub fn push(&self, method: &str, result: ApiResult<Value>) {
        self.script
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queues a `getUpdates` batch with the given ids.
    pub fn push_batch(&self, ids: &[i64]) {
        let batch: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "update_id": id,
                    "message": {
                        "message_id": id,
                        "date": 0,
                        "chat": { "id": 42, "type": "private" },
                        "from": { "id": 7, "is_bot": false, "first_name": "Test" },
                        "text": "hi",
                    },
                })
            })
            .collect();
        self.push("getUpdates", Ok(Value::Array(batch)));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl BotApi for ScriptedApi {
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        self.calls.lock().push((method.to_string(), params.clone()));

        let scripted = self
            .script
            .lock()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        if let Some(result) = scripted {
            return result;
        }

        match method {
            // An idle long poll.
            "getUpdates" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!([]))
            }
            "getMe" => Ok(json!({
                "id": 1,
                "is_bot": true,
                "first_name": "Bot",
                "username": "test_bot",
            })),
            "sendMessage" => Ok(json!({
                "message_id": 1,
                "date": 0,
                "chat": { "id": params["chat_id"], "type": "private" },
                "text": params["text"],
            })),
            _ => Ok(json!(true)),
        }
    }
}

/// Forwards the id of every handled update.
pub(crate) struct Collect(pub mpsc::UnboundedSender<i64>);

#[async_trait]
impl UpdateHandler for Collect {
    async fn handle_update(&self, update: Update) {
        let _ = self.0.send(update.update_id);
    }
}

pub(crate) fn collect() -> (Arc<Collect>, mpsc::UnboundedReceiver<i64>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Collect(tx)), rx)
}
