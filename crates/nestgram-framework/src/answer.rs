//! Per-update convenience facade.
//!
//! [`Answer`] is built by the dispatcher for every update and handed to each
//! middleware and controller method. Its operations fill in the chat, user,
//! message and query ids from the bound update, so a handler can write
//! `answer.send("hi")` instead of threading ids around.
//!
//! | Operation | Ids resolved from the update |
//! |-----------|------------------------------|
//! | `send`, `chat_action` | chat |
//! | `reply`, `stop_live_location`, `forward`, `copy` | chat, message |
//! | `alert`, `toast` | callback query |
//! | `get_user_profile_photos` | user |
//! | `ban`, `unban`, `restrict`, `promote`, `admin_title` | chat, user (user overridable) |
//! | `enter_scope`, `exit_scope`, `current_scope` | chat, user |
//!
//! A missing id fails the operation with
//! [`ApiError::MissingIdentifier`]; the dispatcher logs it like any other
//! handler error.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::FrameworkResult;
use crate::scope::{ScopeSession, ScopeStore};
use nestgram_core::filter::{self, require};
use nestgram_core::{
    Api, ApiError, ApiResult, CallbackAnswerOptions, ChatAction, ChatId, ChatPermissions,
    CopyOptions, File, ForwardOptions, Identifier, LiveLocationOptions, Message, MessageId,
    MessageOrTrue, PromotePermissions, SendOptions, Update, UserProfilePhotos,
};

/// Per-update facade over the remote API and the scope store.
#[derive(Clone)]
pub struct Answer {
    update: Arc<Update>,
    api: Api,
    scopes: Arc<ScopeStore>,
}

impl std::fmt::Debug for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Answer")
            .field("update_id", &self.update.update_id)
            .finish_non_exhaustive()
    }
}

impl Answer {
    /// Binds a facade to one update.
    pub fn new(update: Arc<Update>, api: Api, scopes: Arc<ScopeStore>) -> Self {
        Self {
            update,
            api,
            scopes,
        }
    }

    /// The update this facade is bound to.
    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    /// The raw API, for calls that need explicit ids.
    pub fn api(&self) -> &Api {
        &self.api
    }

    fn chat_id(&self) -> ApiResult<i64> {
        require(filter::chat_id(&self.update), Identifier::Chat)
    }

    fn user_id(&self, explicit: Option<i64>) -> ApiResult<i64> {
        require(explicit.or_else(|| filter::user_id(&self.update)), Identifier::User)
    }

    fn message_id(&self) -> ApiResult<i64> {
        require(filter::message_id(&self.update), Identifier::Message)
    }

    fn callback_query_id(&self) -> ApiResult<&str> {
        require(
            filter::callback_query_id(&self.update),
            Identifier::CallbackQuery,
        )
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    /// Sends a text message to the update's chat.
    pub async fn send(&self, text: impl AsRef<str>) -> ApiResult<Message> {
        self.send_with(text, &SendOptions::default()).await
    }

    /// Sends a text message with options (keyboard, parse mode...).
    pub async fn send_with(
        &self,
        text: impl AsRef<str>,
        options: &SendOptions,
    ) -> ApiResult<Message> {
        let chat_id = self.chat_id()?;
        self.api
            .send_message(chat_id, text.as_ref(), options)
            .await
    }

    /// Sends a text message replying to the update's message.
    pub async fn reply(&self, text: impl AsRef<str>) -> ApiResult<Message> {
        let options = SendOptions::default().reply_to(self.message_id()?);
        self.send_with(text, &options).await
    }

    /// Shows a chat action in the update's chat.
    pub async fn chat_action(&self, action: ChatAction) -> ApiResult<bool> {
        let chat_id = self.chat_id()?;
        self.api
            .send_chat_action(ChatId::Id(chat_id), action)
            .await
    }

    /// Stops the live location carried by the update's message.
    pub async fn stop_live_location(
        &self,
        options: &LiveLocationOptions,
    ) -> ApiResult<MessageOrTrue> {
        let chat_id = self.chat_id()?;
        let message_id = self.message_id()?;
        self.api
            .stop_message_live_location(chat_id, message_id, options)
            .await
    }

    /// Forwards the update's message to another chat.
    pub async fn forward(
        &self,
        to_chat_id: impl Into<ChatId>,
        options: &ForwardOptions,
    ) -> ApiResult<Message> {
        let chat_id = self.chat_id()?;
        let message_id = self.message_id()?;
        self.api
            .forward_message(to_chat_id, chat_id, message_id, options)
            .await
    }

    /// Copies the update's message to another chat.
    pub async fn copy(
        &self,
        to_chat_id: impl Into<ChatId>,
        options: &CopyOptions,
    ) -> ApiResult<MessageId> {
        let chat_id = self.chat_id()?;
        let message_id = self.message_id()?;
        self.api
            .copy_message(to_chat_id, chat_id, message_id, options)
            .await
    }

    // ------------------------------------------------------------------------
    // Callback queries
    // ------------------------------------------------------------------------

    /// Acknowledges the button press with a modal alert.
    pub async fn alert(
        &self,
        text: &str,
        options: &CallbackAnswerOptions,
    ) -> ApiResult<bool> {
        let query_id = self.callback_query_id()?;
        self.api
            .answer_callback_query(query_id, Some(text), true, options)
            .await
    }

    /// Acknowledges the button press with a short toast.
    pub async fn toast(
        &self,
        text: &str,
        options: &CallbackAnswerOptions,
    ) -> ApiResult<bool> {
        let query_id = self.callback_query_id()?;
        self.api
            .answer_callback_query(query_id, Some(text), false, options)
            .await
    }

    // ------------------------------------------------------------------------
    // Chat administration
    // ------------------------------------------------------------------------

    /// Bans the update's sender, or `user_id` when given.
    pub async fn ban(
        &self,
        until_date: Option<i64>,
        revoke_messages: Option<bool>,
        user_id: Option<i64>,
    ) -> ApiResult<bool> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(user_id)?;
        self.api
            .ban_chat_member(chat_id, user_id, until_date, revoke_messages)
            .await
    }

    /// Lifts a ban on the update's sender, or `user_id` when given.
    pub async fn unban(&self, only_if_banned: bool, user_id: Option<i64>) -> ApiResult<bool> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(user_id)?;
        self.api
            .unban_chat_member(chat_id, user_id, only_if_banned)
            .await
    }

    /// Restricts the update's sender, or `user_id` when given.
    pub async fn restrict(
        &self,
        permissions: &ChatPermissions,
        user_id: Option<i64>,
        until_date: Option<i64>,
    ) -> ApiResult<bool> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(user_id)?;
        self.api
            .restrict_chat_member(chat_id, user_id, permissions, until_date)
            .await
    }

    /// Promotes the update's sender, or `user_id` when given.
    pub async fn promote(
        &self,
        rights: &PromotePermissions,
        user_id: Option<i64>,
    ) -> ApiResult<bool> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(user_id)?;
        self.api.promote_chat_member(chat_id, user_id, rights).await
    }

    /// Sets the administrator title of the update's sender, or `user_id`.
    pub async fn admin_title(&self, title: &str, user_id: Option<i64>) -> ApiResult<bool> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(user_id)?;
        self.api
            .set_chat_administrator_custom_title(chat_id, user_id, title)
            .await
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Returns the profile pictures of the update's sender.
    pub async fn get_user_profile_photos(
        &self,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> ApiResult<UserProfilePhotos> {
        let user_id = self.user_id(None)?;
        self.api
            .get_user_profile_photos(user_id, offset, limit)
            .await
    }

    /// Prepares a file for download.
    pub async fn get_file(&self, file_id: &str) -> ApiResult<File> {
        self.api.get_file(file_id).await
    }

    /// Downloads a file to `path`.
    ///
    /// Without `file_id`, the attachment of the update's message is used
    /// (audio, video, animation, document, voice, then the largest photo).
    /// Returns `false` and logs the reason on any failure.
    pub async fn save_file(&self, path: impl AsRef<Path>, file_id: Option<&str>) -> bool {
        let path = path.as_ref();
        match self.try_save_file(path, file_id).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "Saved file");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save file");
                false
            }
        }
    }

    async fn try_save_file(&self, path: &Path, file_id: Option<&str>) -> ApiResult<u64> {
        let file_id = match file_id {
            Some(id) => id.to_string(),
            None => {
                let message = require(filter::message(&self.update), Identifier::Message)?;
                filter::file_id(message)
                    .ok_or_else(|| ApiError::download("message carries no file"))?
                    .to_string()
            }
        };

        let file = self.api.get_file(&file_id).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| ApiError::download(format!("file {file_id} has no download path")))?;
        self.api.download_file(&file_path, path).await
    }

    /// Downloads the largest size of the sender's `index`-th profile picture.
    ///
    /// Returns `false` and logs the reason on any failure.
    pub async fn save_profile_photo(&self, path: impl AsRef<Path>, index: usize) -> bool {
        let path = path.as_ref();
        let photos = match self.get_user_profile_photos(None, None).await {
            Ok(photos) => photos,
            Err(e) => {
                warn!(error = %e, "Failed to fetch profile photos");
                return false;
            }
        };

        let Some(file_id) = photos
            .photos
            .get(index)
            .and_then(|sizes| sizes.last())
            .map(|p| p.file_id.clone())
        else {
            warn!(index, total = photos.total_count, "No profile photo at index");
            return false;
        };

        self.save_file(path, Some(&file_id)).await
    }

    // ------------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------------

    /// Moves the update's sender into a scope. Replaces any open scope.
    pub fn enter_scope(&self, name: &str) -> FrameworkResult<()> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(None)?;
        self.scopes.enter(chat_id, user_id, name)
    }

    /// Returns the update's sender to the global handlers.
    pub fn exit_scope(&self) -> FrameworkResult<Option<ScopeSession>> {
        let chat_id = self.chat_id()?;
        let user_id = self.user_id(None)?;
        Ok(self.scopes.exit(chat_id, user_id))
    }

    /// Name of the sender's open scope, if any.
    pub fn current_scope(&self) -> Option<String> {
        let (chat_id, user_id) = filter::session_key(&self.update)?;
        self.scopes
            .session(chat_id, user_id)
            .map(|session| session.scope_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeDefinition;
    use crate::testing::{MockApi, callback_update, message_update};
    use nestgram_core::{Media, UpdateKind};
    use serde_json::{Value, json};

    fn answer_for(update: Update, mock: &Arc<MockApi>) -> Answer {
        Answer::new(
            Arc::new(update),
            Api::from_arc(mock.clone()),
            Arc::new(ScopeStore::new()),
        )
    }

    #[tokio::test]
    async fn test_send_resolves_chat_id() {
        let mock = MockApi::new();
        let answer = answer_for(message_update(1, 42, 7, "/start"), &mock);

        let sent = answer.send("hello").await.unwrap();
        assert_eq!(sent.chat.id, 42);

        let calls = mock.calls();
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1, json!({ "chat_id": 42, "text": "hello" }));
    }

    #[tokio::test]
    async fn test_reply_targets_bound_message() {
        let mock = MockApi::new();
        let answer = answer_for(message_update(1, 42, 7, "hi"), &mock);

        answer.reply("pong").await.unwrap();
        assert_eq!(mock.calls()[0].1["reply_to_message_id"], 100);
    }

    #[tokio::test]
    async fn test_missing_chat_is_reported_without_remote_call() {
        let mock = MockApi::new();
        let answer = answer_for(Update::new(9, UpdateKind::Unknown(Value::Null)), &mock);

        let err = answer.send("hello").await.unwrap_err();
        assert!(matches!(err, ApiError::MissingIdentifier(Identifier::Chat)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_alert_and_toast() {
        let mock = MockApi::new();
        let answer = answer_for(callback_update(2, 42, 7, "yes"), &mock);

        answer.alert("Sure?", &CallbackAnswerOptions::default()).await.unwrap();
        answer.toast("Done", &CallbackAnswerOptions::default()).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].0, "answerCallbackQuery");
        assert_eq!(calls[0].1["callback_query_id"], "cb-2");
        assert_eq!(calls[0].1["show_alert"], true);
        assert_eq!(calls[1].1["show_alert"], false);
        assert_eq!(calls[1].1["text"], "Done");

        // A plain message has no callback query to acknowledge.
        let plain = answer_for(message_update(3, 42, 7, "x"), &mock);
        let err = plain.toast("x", &CallbackAnswerOptions::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingIdentifier(Identifier::CallbackQuery)));
    }

    #[tokio::test]
    async fn test_ban_uses_explicit_user_over_sender() {
        let mock = MockApi::new();
        let answer = answer_for(message_update(1, -100, 7, "spam"), &mock);

        answer.ban(None, Some(true), None).await.unwrap();
        answer.ban(Some(1_700_000_000), None, Some(99)).await.unwrap();

        let calls = mock.calls();
        assert_eq!(
            calls[0].1,
            json!({ "chat_id": -100, "user_id": 7, "revoke_messages": true })
        );
        assert_eq!(calls[1].1["user_id"], 99);
        assert_eq!(calls[1].1["until_date"], 1_700_000_000);
    }

    #[tokio::test]
    async fn test_forward_passes_source_and_destination() {
        let mock = MockApi::new();
        let answer = answer_for(message_update(1, 42, 7, "fwd"), &mock);

        answer.forward("@archive", &ForwardOptions::default()).await.unwrap();
        assert_eq!(
            mock.calls()[0].1,
            json!({ "chat_id": "@archive", "from_chat_id": 42, "message_id": 100 })
        );
    }

    #[tokio::test]
    async fn test_save_file_uses_message_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("doc.bin");

        let mock = MockApi::new();
        mock.respond(
            "getFile",
            json!({ "file_id": "doc-1", "file_path": "documents/file_1.pdf" }),
        );

        let mut update = message_update(1, 42, 7, "");
        if let UpdateKind::Message(message) = &mut update.kind {
            message.document = Some(Media {
                file_id: "doc-1".into(),
                ..Default::default()
            });
        }
        let answer = answer_for(update, &mock);

        assert!(answer.save_file(&dest, None).await);
        assert_eq!(mock.calls()[0].1, json!({ "file_id": "doc-1" }));
        assert_eq!(mock.downloads(), vec!["documents/file_1.pdf".to_string()]);
        assert_eq!(std::fs::read(&dest).unwrap(), MockApi::DOWNLOAD_BODY);
    }

    #[tokio::test]
    async fn test_save_file_without_attachment_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockApi::new();
        let answer = answer_for(message_update(1, 42, 7, "no file"), &mock);

        assert!(!answer.save_file(dir.path().join("x"), None).await);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_profile_photo_picks_largest_size() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockApi::new();
        mock.respond(
            "getUserProfilePhotos",
            json!({
                "total_count": 1,
                "photos": [[
                    { "file_id": "small", "width": 160, "height": 160 },
                    { "file_id": "big", "width": 640, "height": 640 }
                ]]
            }),
        );
        mock.respond("getFile", json!({ "file_id": "big", "file_path": "photos/big.jpg" }));
        let answer = answer_for(message_update(1, 42, 7, ""), &mock);

        assert!(answer.save_profile_photo(dir.path().join("me.jpg"), 0).await);
        assert_eq!(mock.calls()[1].1["file_id"], "big");

        // Out of range index.
        assert!(!answer.save_profile_photo(dir.path().join("none.jpg"), 3).await);
    }

    #[tokio::test]
    async fn test_scope_helpers() {
        let mock = MockApi::new();
        let store = Arc::new(ScopeStore::new());
        store
            .register_scope(ScopeDefinition::new("survey", Vec::new()))
            .unwrap();
        let answer = Answer::new(
            Arc::new(message_update(1, 42, 7, "")),
            Api::from_arc(mock.clone()),
            Arc::clone(&store),
        );

        assert_eq!(answer.current_scope(), None);
        answer.enter_scope("survey").unwrap();
        assert_eq!(answer.current_scope().as_deref(), Some("survey"));
        assert!(answer.enter_scope("missing").is_err());
        // A failed enter keeps the open scope.
        assert_eq!(answer.current_scope().as_deref(), Some("survey"));

        let closed = answer.exit_scope().unwrap().unwrap();
        assert_eq!(closed.scope_name, "survey");
        assert_eq!(answer.current_scope(), None);
    }
}
