//! Remote Bot API call surface.
//!
//! # Overview
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | Raw | [`BotApi`] | One method name + JSON params in, JSON `result` out. Implemented by the HTTP transport and by test doubles. |
//! | Typed | [`Api`] | Cheap-to-clone facade with one strongly typed method per remote operation. |
//!
//! The dispatcher, the polling loop and every [`Answer`] share the same
//! [`Api`], so swapping the [`BotApi`] implementation swaps the network for
//! the whole bot.
//!
//! [`Answer`]: https://docs.rs/nestgram-framework

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::trace;

use crate::error::{ApiError, ApiResult};
use crate::types::{
    BotInfo, CallbackAnswerOptions, ChatAction, ChatId, ChatPermissions, CopyOptions, File,
    ForwardOptions, GetUpdates, LiveLocationOptions, MessageId, MessageOrTrue,
    PromotePermissions, SendOptions, UserProfilePhotos, WebhookOptions,
};
use crate::update::Message;

// =============================================================================
// BotApi trait
// =============================================================================

/// Transport-specific remote API mechanism.
///
/// Implementations only move bytes: they receive the method name
/// (e.g. `"sendMessage"`) and a JSON object of parameters, and return the
/// unwrapped `result` of the response envelope.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Calls a remote method and returns its `result` value.
    ///
    /// # Errors
    /// Returns [`ApiError::Remote`] when the platform rejects the call and
    /// [`ApiError::Transport`] when the request cannot be delivered.
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value>;

    /// Streams a remote file (path as returned by `getFile`) to `dest`.
    ///
    /// Returns the number of bytes written. The default implementation does
    /// not support downloads.
    async fn download(&self, _file_path: &str, _dest: &Path) -> ApiResult<u64> {
        Err(ApiError::NotSupported)
    }
}

/// Type-erased [`BotApi`].
pub type BoxedBotApi = Arc<dyn BotApi>;

// =============================================================================
// Api facade
// =============================================================================

/// Strongly typed facade over a [`BotApi`].
#[derive(Clone)]
pub struct Api {
    inner: BoxedBotApi,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}

/// Adds every field of a serialized options struct to a params object.
fn merge(mut params: Value, options: &impl Serialize) -> ApiResult<Value> {
    if let (Value::Object(target), Value::Object(extra)) =
        (&mut params, serde_json::to_value(options)?)
    {
        target.extend(extra);
    }
    Ok(params)
}

macro_rules! impl_api {
    // Deserializes the result into the given type.
    ($(#[$meta:meta])* $name:ident => $method:literal, ($($arg:ident: $typ:ty),*) -> $ret:ty) => {
        $(#[$meta])*
        pub async fn $name(&self, $($arg: $typ),*) -> ApiResult<$ret> {
            self.call_as($method, json!({ $(stringify!($arg): $arg),* })).await
        }
    };
}

impl Api {
    /// Wraps a [`BotApi`] implementation.
    pub fn new(inner: impl BotApi + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Wraps an already shared [`BotApi`].
    pub fn from_arc(inner: BoxedBotApi) -> Self {
        Self { inner }
    }

    /// Returns the underlying raw API.
    pub fn raw(&self) -> &BoxedBotApi {
        &self.inner
    }

    /// Calls a remote method that has no typed wrapper.
    pub async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        trace!(method = %method, "Calling remote API");
        self.inner.call(method, params).await
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> ApiResult<T> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Streams a remote file to disk. See [`BotApi::download`].
    pub async fn download_file(&self, file_path: &str, dest: &Path) -> ApiResult<u64> {
        self.inner.download(file_path, dest).await
    }

    // -------------------------------------------------------------------------
    // Update acquisition
    // -------------------------------------------------------------------------

    /// Fetches a batch of pending updates (long-poll).
    ///
    /// Elements are left undecoded so that one malformed update does not
    /// fail the batch; see [`parse_update_value`](crate::parse_update_value).
    pub async fn get_updates(&self, request: &GetUpdates) -> ApiResult<Vec<Value>> {
        self.call_as("getUpdates", serde_json::to_value(request)?)
            .await
    }

    impl_api!(
        /// Returns information about the bot.
        get_me => "getMe", () -> BotInfo
    );

    /// Registers a webhook URL.
    pub async fn set_webhook(&self, options: &WebhookOptions) -> ApiResult<bool> {
        self.call_as("setWebhook", serde_json::to_value(options)?)
            .await
    }

    impl_api!(
        /// Removes the webhook so that `getUpdates` can be used.
        delete_webhook => "deleteWebhook", (drop_pending_updates: bool) -> bool
    );

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    /// Sends a text message.
    pub async fn send_message(
        &self,
        chat_id: impl Into<ChatId>,
        text: &str,
        options: &SendOptions,
    ) -> ApiResult<Message> {
        let params = json!({ "chat_id": chat_id.into(), "text": text });
        self.call_as("sendMessage", merge(params, options)?).await
    }

    impl_api!(
        /// Shows a chat action (typing, uploading...) in the chat header.
        send_chat_action => "sendChatAction", (chat_id: ChatId, action: ChatAction) -> bool
    );

    /// Stops updating a live location message.
    pub async fn stop_message_live_location(
        &self,
        chat_id: impl Into<ChatId>,
        message_id: i64,
        options: &LiveLocationOptions,
    ) -> ApiResult<MessageOrTrue> {
        let params = json!({ "chat_id": chat_id.into(), "message_id": message_id });
        self.call_as("stopMessageLiveLocation", merge(params, options)?)
            .await
    }

    /// Forwards a message from one chat to another.
    pub async fn forward_message(
        &self,
        to_chat_id: impl Into<ChatId>,
        from_chat_id: impl Into<ChatId>,
        message_id: i64,
        options: &ForwardOptions,
    ) -> ApiResult<Message> {
        let params = json!({
            "chat_id": to_chat_id.into(),
            "from_chat_id": from_chat_id.into(),
            "message_id": message_id,
        });
        self.call_as("forwardMessage", merge(params, options)?).await
    }

    /// Copies a message without the "forwarded from" header.
    pub async fn copy_message(
        &self,
        to_chat_id: impl Into<ChatId>,
        from_chat_id: impl Into<ChatId>,
        message_id: i64,
        options: &CopyOptions,
    ) -> ApiResult<MessageId> {
        let params = json!({
            "chat_id": to_chat_id.into(),
            "from_chat_id": from_chat_id.into(),
            "message_id": message_id,
        });
        self.call_as("copyMessage", merge(params, options)?).await
    }

    // -------------------------------------------------------------------------
    // Callback queries
    // -------------------------------------------------------------------------

    /// Acknowledges a callback query, optionally with a notification.
    ///
    /// With `show_alert` the client shows a modal alert instead of a toast.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
        options: &CallbackAnswerOptions,
    ) -> ApiResult<bool> {
        let mut params = json!({
            "callback_query_id": callback_query_id,
            "show_alert": show_alert,
        });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.call_as("answerCallbackQuery", merge(params, options)?)
            .await
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    impl_api!(
        /// Prepares a file for download.
        get_file => "getFile", (file_id: &str) -> File
    );

    /// Returns a user's profile pictures.
    pub async fn get_user_profile_photos(
        &self,
        user_id: i64,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> ApiResult<UserProfilePhotos> {
        let mut params = Map::new();
        params.insert("user_id".into(), json!(user_id));
        if let Some(offset) = offset {
            params.insert("offset".into(), json!(offset));
        }
        if let Some(limit) = limit {
            params.insert("limit".into(), json!(limit));
        }
        self.call_as("getUserProfilePhotos", Value::Object(params))
            .await
    }

    // -------------------------------------------------------------------------
    // Chat administration
    // -------------------------------------------------------------------------

    /// Bans a user. `until_date` is a unix timestamp; absent means forever.
    pub async fn ban_chat_member(
        &self,
        chat_id: impl Into<ChatId>,
        user_id: i64,
        until_date: Option<i64>,
        revoke_messages: Option<bool>,
    ) -> ApiResult<bool> {
        let mut params = json!({ "chat_id": chat_id.into(), "user_id": user_id });
        if let Some(until_date) = until_date {
            params["until_date"] = json!(until_date);
        }
        if let Some(revoke) = revoke_messages {
            params["revoke_messages"] = json!(revoke);
        }
        self.call_as("banChatMember", params).await
    }

    /// Lifts a ban.
    pub async fn unban_chat_member(
        &self,
        chat_id: impl Into<ChatId>,
        user_id: i64,
        only_if_banned: bool,
    ) -> ApiResult<bool> {
        let params = json!({
            "chat_id": chat_id.into(),
            "user_id": user_id,
            "only_if_banned": only_if_banned,
        });
        self.call_as("unbanChatMember", params).await
    }

    /// Restricts what a member may do.
    pub async fn restrict_chat_member(
        &self,
        chat_id: impl Into<ChatId>,
        user_id: i64,
        permissions: &ChatPermissions,
        until_date: Option<i64>,
    ) -> ApiResult<bool> {
        let mut params = json!({
            "chat_id": chat_id.into(),
            "user_id": user_id,
            "permissions": permissions,
        });
        if let Some(until_date) = until_date {
            params["until_date"] = json!(until_date);
        }
        self.call_as("restrictChatMember", params).await
    }

    /// Grants administrator rights.
    pub async fn promote_chat_member(
        &self,
        chat_id: impl Into<ChatId>,
        user_id: i64,
        rights: &PromotePermissions,
    ) -> ApiResult<bool> {
        let params = json!({ "chat_id": chat_id.into(), "user_id": user_id });
        self.call_as("promoteChatMember", merge(params, rights)?)
            .await
    }

    /// Sets a custom title for an administrator.
    pub async fn set_chat_administrator_custom_title(
        &self,
        chat_id: impl Into<ChatId>,
        user_id: i64,
        custom_title: &str,
    ) -> ApiResult<bool> {
        let params = json!({
            "chat_id": chat_id.into(),
            "user_id": user_id,
            "custom_title": custom_title,
        });
        self.call_as("setChatAdministratorCustomTitle", params)
            .await
    }
}
