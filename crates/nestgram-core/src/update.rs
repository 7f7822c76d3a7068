//! Inbound update model.
//!
//! The platform delivers every event as a JSON object carrying an `update_id`
//! and exactly one payload field (`message`, `callback_query`, ...). This
//! module turns that shape into an explicit tagged union:
//!
//! ```text
//! Update { update_id, kind }
//! └── UpdateKind
//!     ├── Message(Message)
//!     ├── EditedMessage(Message)
//!     ├── ChannelPost(Message)
//!     ├── EditedChannelPost(Message)
//!     ├── CallbackQuery(CallbackQuery)
//!     ├── InlineQuery(InlineQuery)
//!     └── Unknown(Value)        ← anything else, passed through untouched
//! ```
//!
//! Payload fields the framework does not model are kept in the `extra` map of
//! each struct, so re-serializing an update loses nothing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Update
// ============================================================================

/// One event emitted by the remote platform.
///
/// Updates are immutable once received; the dispatcher shares them behind an
/// `Arc` between middlewares and controller methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUpdate", into = "RawUpdate")]
pub struct Update {
    /// Monotonically increasing identifier, used as the polling offset.
    pub update_id: i64,
    /// The variant payload.
    pub kind: UpdateKind,
}

impl Update {
    /// Creates an update from its id and payload.
    pub fn new(update_id: i64, kind: UpdateKind) -> Self {
        Self { update_id, kind }
    }

    /// Returns the discriminant of this update's payload.
    pub fn update_type(&self) -> UpdateType {
        self.kind.update_type()
    }
}

/// The payload of an [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    /// A variant this framework does not model. Holds every field except
    /// `update_id`.
    Unknown(Value),
}

impl UpdateKind {
    /// Returns the field-less discriminant of this payload.
    pub fn update_type(&self) -> UpdateType {
        match self {
            Self::Message(_) => UpdateType::Message,
            Self::EditedMessage(_) => UpdateType::EditedMessage,
            Self::ChannelPost(_) => UpdateType::ChannelPost,
            Self::EditedChannelPost(_) => UpdateType::EditedChannelPost,
            Self::CallbackQuery(_) => UpdateType::CallbackQuery,
            Self::InlineQuery(_) => UpdateType::InlineQuery,
            Self::Unknown(_) => UpdateType::Unknown,
        }
    }
}

/// Discriminant of [`UpdateKind`], used by handler entries to declare which
/// updates they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    CallbackQuery,
    InlineQuery,
    Unknown,
}

impl UpdateType {
    /// The JSON field name the platform uses for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of an update, used only for (de)serialization.
#[derive(Serialize, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edited_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edited_channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_query: Option<CallbackQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_query: Option<InlineQuery>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        let kind = if let Some(m) = raw.message {
            UpdateKind::Message(m)
        } else if let Some(m) = raw.edited_message {
            UpdateKind::EditedMessage(m)
        } else if let Some(m) = raw.channel_post {
            UpdateKind::ChannelPost(m)
        } else if let Some(m) = raw.edited_channel_post {
            UpdateKind::EditedChannelPost(m)
        } else if let Some(q) = raw.callback_query {
            UpdateKind::CallbackQuery(q)
        } else if let Some(q) = raw.inline_query {
            UpdateKind::InlineQuery(q)
        } else {
            UpdateKind::Unknown(Value::Object(raw.rest))
        };

        Self {
            update_id: raw.update_id,
            kind,
        }
    }
}

impl From<Update> for RawUpdate {
    fn from(update: Update) -> Self {
        let mut raw = RawUpdate {
            update_id: update.update_id,
            message: None,
            edited_message: None,
            channel_post: None,
            edited_channel_post: None,
            callback_query: None,
            inline_query: None,
            rest: Map::new(),
        };

        match update.kind {
            UpdateKind::Message(m) => raw.message = Some(m),
            UpdateKind::EditedMessage(m) => raw.edited_message = Some(m),
            UpdateKind::ChannelPost(m) => raw.channel_post = Some(m),
            UpdateKind::EditedChannelPost(m) => raw.edited_channel_post = Some(m),
            UpdateKind::CallbackQuery(q) => raw.callback_query = Some(q),
            UpdateKind::InlineQuery(q) => raw.inline_query = Some(q),
            UpdateKind::Unknown(Value::Object(rest)) => raw.rest = rest,
            UpdateKind::Unknown(_) => {}
        }

        raw
    }
}

// ============================================================================
// Payload types
// ============================================================================

/// A platform user or bot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A private chat, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub chat_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One size of a photo or thumbnail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// A downloadable attachment (audio, video, animation, document or voice).
///
/// Only the fields shared by every attachment kind are modelled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Media {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message in a chat.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Returns the text, falling back to the media caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_instance: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An inline-mode query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
