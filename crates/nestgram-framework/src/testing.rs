//! Test doubles shared by this crate's unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use nestgram_core::{
    ApiError, ApiResult, BotApi, CallbackQuery, Chat, Message, Update, UpdateKind, User,
};

/// Records every call; answers with canned responses.
#[derive(Default)]
pub(crate) struct MockApi {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<HashMap<String, Value>>,
    downloads: Mutex<Vec<String>>,
}

impl MockApi {
    pub const DOWNLOAD_BODY: &'static [u8] = b"file-bytes";

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: &str, result: Value) {
        self.responses.lock().insert(method.to_string(), result);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }
}

#[async_trait]
impl BotApi for MockApi {
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        self.calls.lock().push((method.to_string(), params.clone()));

        if let Some(result) = self.responses.lock().get(method) {
            return Ok(result.clone());
        }
        Ok(match method {
            "sendMessage" | "forwardMessage" => json!({
                "message_id": 1,
                "date": 0,
                "chat": { "id": params["chat_id"], "type": "private" },
                "text": params["text"],
            }),
            "copyMessage" => json!({ "message_id": 1 }),
            _ => json!(true),
        })
    }

    async fn download(&self, file_path: &str, dest: &Path) -> ApiResult<u64> {
        self.downloads.lock().push(file_path.to_string());
        std::fs::write(dest, Self::DOWNLOAD_BODY).map_err(|e| ApiError::download(e.to_string()))?;
        Ok(Self::DOWNLOAD_BODY.len() as u64)
    }
}

/// A text message from `user_id` in `chat_id`, with message id 100.
pub(crate) fn message_update(update_id: i64, chat_id: i64, user_id: i64, text: &str) -> Update {
    Update::new(
        update_id,
        UpdateKind::Message(Message {
            message_id: 100,
            chat: Chat {
                id: chat_id,
                chat_type: "private".into(),
                ..Default::default()
            },
            from: Some(User {
                id: user_id,
                first_name: "Test".into(),
                ..Default::default()
            }),
            text: Some(text.to_string()),
            ..Default::default()
        }),
    )
}

/// A button press with id `cb-<update_id>` on a message in `chat_id`.
pub(crate) fn callback_update(update_id: i64, chat_id: i64, user_id: i64, data: &str) -> Update {
    let Update {
        kind: UpdateKind::Message(message),
        ..
    } = message_update(update_id, chat_id, 0, "")
    else {
        unreachable!()
    };

    Update::new(
        update_id,
        UpdateKind::CallbackQuery(CallbackQuery {
            id: format!("cb-{update_id}"),
            from: User {
                id: user_id,
                ..Default::default()
            },
            message: Some(Message {
                from: None,
                ..message
            }),
            data: Some(data.to_string()),
            ..Default::default()
        }),
    )
}
