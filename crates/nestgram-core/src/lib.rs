//! # NestGram Core
//!
//! Shared building blocks of the NestGram bot framework.
//!
//! ## Contents
//!
//! - **Update model**: the inbound event as a tagged union ([`Update`],
//!   [`UpdateKind`], [`UpdateType`]) plus its payload types.
//! - **Filter**: total functions resolving chat, user, message and query ids
//!   from an update of any variant ([`filter`]).
//! - **API surface**: the raw [`BotApi`] trait implemented by transports and
//!   the typed [`Api`] facade used by everything else.
//! - **Sink**: [`UpdateHandler`], the interface update sources feed.
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────────┐  Update  ┌───────────────┐  Api  ┌─────────┐
//! │ Update source │─────────▶│ UpdateHandler │──────▶│ BotApi  │
//! │ (poll / hook) │          │ (dispatcher)  │       │ (HTTP)  │
//! └───────────────┘          └───────────────┘       └─────────┘
//! ```

pub mod api;
pub mod error;
pub mod filter;
pub mod sink;
pub mod types;
pub mod update;

pub use api::{Api, BotApi, BoxedBotApi};
pub use error::{ApiError, ApiResult, Identifier, ParseError};
pub use sink::{BoxedUpdateHandler, UpdateHandler};
pub use types::{
    BotInfo, CallbackAnswerOptions, ChatAction, ChatId, ChatPermissions, CopyOptions, File,
    ForwardOptions, GetUpdates, LiveLocationOptions, MessageId, MessageOrTrue,
    PromotePermissions, SendOptions, UserProfilePhotos, WebhookOptions,
};
pub use update::{
    CallbackQuery, Chat, InlineQuery, Media, Message, PhotoSize, Update, UpdateKind, UpdateType,
    User,
};

/// Parses a raw JSON body into an [`Update`].
pub fn parse_update(body: &[u8]) -> Result<Update, ParseError> {
    Ok(serde_json::from_slice(body)?)
}

/// Parses one element of a `getUpdates` result.
pub fn parse_update_value(value: serde_json::Value) -> Result<Update, ParseError> {
    Ok(serde_json::from_value(value)?)
}

/// Reads `update_id` from an update that may not parse.
pub fn raw_update_id(value: &serde_json::Value) -> Option<i64> {
    value.get("update_id")?.as_i64()
}

/// Prelude for common imports.
pub mod prelude {
    pub use super::filter;
    pub use super::{
        Api, ApiError, ApiResult, BotApi, ChatAction, ChatId, Message, SendOptions, Update,
        UpdateKind, UpdateType,
    };
}
