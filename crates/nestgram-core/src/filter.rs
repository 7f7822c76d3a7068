//! Identifier extraction from updates of any variant.
//!
//! Every function here is total: it inspects the applicable variants in a
//! fixed priority order and returns `None` when nothing matches. Callers
//! decide whether absence is fatal, usually by turning it into
//! [`ApiError::MissingIdentifier`](crate::ApiError::MissingIdentifier) via
//! [`require`].
//!
//! Priority order for chat and message ids:
//!
//! ```text
//! message → edited_message → channel_post → edited_channel_post → callback_query.message
//! ```
//!
//! For user ids the sender of each message variant is checked first, then
//! `callback_query.from` and `inline_query.from`.

use crate::error::{ApiError, ApiResult, Identifier};
use crate::update::{Message, Update, UpdateKind, User};

/// Returns the message directly carried by the update, if any.
fn direct_message(update: &Update) -> Option<&Message> {
    match &update.kind {
        UpdateKind::Message(m)
        | UpdateKind::EditedMessage(m)
        | UpdateKind::ChannelPost(m)
        | UpdateKind::EditedChannelPost(m) => Some(m),
        _ => None,
    }
}

/// Returns the best-available message: the update's own message, or the
/// message a callback button was attached to.
pub fn message(update: &Update) -> Option<&Message> {
    direct_message(update).or(match &update.kind {
        UpdateKind::CallbackQuery(q) => q.message.as_ref(),
        _ => None,
    })
}

/// Returns the user who caused the update.
pub fn user(update: &Update) -> Option<&User> {
    if let Some(from) = direct_message(update).and_then(|m| m.from.as_ref()) {
        return Some(from);
    }
    match &update.kind {
        UpdateKind::CallbackQuery(q) => Some(&q.from),
        UpdateKind::InlineQuery(q) => Some(&q.from),
        _ => None,
    }
}

/// Returns the id of the chat the update belongs to.
pub fn chat_id(update: &Update) -> Option<i64> {
    message(update).map(|m| m.chat.id)
}

/// Returns the id of the user who caused the update.
pub fn user_id(update: &Update) -> Option<i64> {
    user(update).map(|u| u.id)
}

/// Returns the id of the message the update refers to.
pub fn message_id(update: &Update) -> Option<i64> {
    message(update).map(|m| m.message_id)
}

/// Returns the callback query id of a button press.
pub fn callback_query_id(update: &Update) -> Option<&str> {
    match &update.kind {
        UpdateKind::CallbackQuery(q) => Some(q.id.as_str()),
        _ => None,
    }
}

/// Returns the inline query id of an inline-mode query.
pub fn inline_query_id(update: &Update) -> Option<&str> {
    match &update.kind {
        UpdateKind::InlineQuery(q) => Some(q.id.as_str()),
        _ => None,
    }
}

/// Returns the text a user typed: message text or caption, callback data,
/// or the inline query string.
pub fn text(update: &Update) -> Option<&str> {
    if let Some(text) = direct_message(update).and_then(Message::text_or_caption) {
        return Some(text);
    }
    match &update.kind {
        UpdateKind::CallbackQuery(q) => q.data.as_deref(),
        UpdateKind::InlineQuery(q) => Some(q.query.as_str()),
        _ => None,
    }
}

/// Returns the downloadable file carried by a message.
///
/// Checks audio, video, animation, document and voice in that order, then
/// the largest size of a photo.
pub fn file_id(message: &Message) -> Option<&str> {
    [
        &message.audio,
        &message.video,
        &message.animation,
        &message.document,
        &message.voice,
    ]
    .into_iter()
    .find_map(|media| media.as_ref().map(|m| m.file_id.as_str()))
    .or_else(|| {
        message
            .photo
            .as_ref()
            .and_then(|sizes| sizes.last())
            .map(|p| p.file_id.as_str())
    })
}

/// Returns the `(chat_id, user_id)` pair that keys scope sessions.
pub fn session_key(update: &Update) -> Option<(i64, i64)> {
    Some((chat_id(update)?, user_id(update)?))
}

/// Converts an absent identifier into [`ApiError::MissingIdentifier`].
pub fn require<T>(value: Option<T>, identifier: Identifier) -> ApiResult<T> {
    value.ok_or(ApiError::MissingIdentifier(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{CallbackQuery, Chat, InlineQuery, Media, PhotoSize};
    use serde_json::{Value, json};

    fn chat(id: i64) -> Chat {
        Chat {
            id,
            ..Default::default()
        }
    }

    fn user_with_id(id: i64) -> User {
        User {
            id,
            ..Default::default()
        }
    }

    fn msg(chat_id: i64, from: Option<i64>, message_id: i64) -> Message {
        Message {
            message_id,
            chat: chat(chat_id),
            from: from.map(user_with_id),
            ..Default::default()
        }
    }

    #[test]
    fn test_message_ids() {
        let update = Update::new(1, UpdateKind::Message(msg(42, Some(7), 100)));
        assert_eq!(chat_id(&update), Some(42));
        assert_eq!(user_id(&update), Some(7));
        assert_eq!(message_id(&update), Some(100));
        assert_eq!(callback_query_id(&update), None);
        assert_eq!(session_key(&update), Some((42, 7)));
    }

    #[test]
    fn test_callback_query_falls_back_to_attached_message() {
        let update = Update::new(
            2,
            UpdateKind::CallbackQuery(CallbackQuery {
                id: "q".into(),
                from: user_with_id(9),
                message: Some(msg(-100, None, 55)),
                ..Default::default()
            }),
        );
        assert_eq!(chat_id(&update), Some(-100));
        assert_eq!(message_id(&update), Some(55));
        // The presser, not the author of the attached message.
        assert_eq!(user_id(&update), Some(9));
        assert_eq!(callback_query_id(&update), Some("q"));
    }

    #[test]
    fn test_channel_post_without_sender() {
        let update = Update::new(3, UpdateKind::ChannelPost(msg(-5, None, 1)));
        assert_eq!(chat_id(&update), Some(-5));
        assert_eq!(user_id(&update), None);
        assert_eq!(session_key(&update), None);
    }

    #[test]
    fn test_absent_identifiers_never_panic() {
        let updates = [
            Update::new(4, UpdateKind::Unknown(Value::Null)),
            Update::new(5, UpdateKind::Unknown(json!({ "poll": {} }))),
            Update::new(
                6,
                UpdateKind::InlineQuery(InlineQuery {
                    id: "iq".into(),
                    from: user_with_id(3),
                    ..Default::default()
                }),
            ),
            Update::new(
                7,
                UpdateKind::CallbackQuery(CallbackQuery {
                    id: "q".into(),
                    ..Default::default()
                }),
            ),
        ];

        for update in &updates {
            assert_eq!(chat_id(update), None);
            assert_eq!(message_id(update), None);
        }
        assert_eq!(inline_query_id(&updates[2]), Some("iq"));
        assert_eq!(user_id(&updates[2]), Some(3));
    }

    #[test]
    fn test_require_reports_identifier() {
        let update = Update::new(8, UpdateKind::Unknown(Value::Null));
        let err = require(chat_id(&update), Identifier::Chat).unwrap_err();
        assert!(matches!(err, ApiError::MissingIdentifier(Identifier::Chat)));
        assert_eq!(err.to_string(), "can't find chat id in update");
    }

    #[test]
    fn test_file_id_priority() {
        let mut message = msg(1, None, 1);
        assert_eq!(file_id(&message), None);

        message.photo = Some(vec![
            PhotoSize {
                file_id: "small".into(),
                ..Default::default()
            },
            PhotoSize {
                file_id: "large".into(),
                ..Default::default()
            },
        ]);
        assert_eq!(file_id(&message), Some("large"));

        message.document = Some(Media {
            file_id: "doc".into(),
            ..Default::default()
        });
        assert_eq!(file_id(&message), Some("doc"));

        message.audio = Some(Media {
            file_id: "audio".into(),
            ..Default::default()
        });
        assert_eq!(file_id(&message), Some("audio"));
    }

    #[test]
    fn test_text_sources() {
        let mut m = msg(1, Some(1), 1);
        m.caption = Some("caption".into());
        assert_eq!(text(&Update::new(1, UpdateKind::Message(m))), Some("caption"));

        let cb = Update::new(
            2,
            UpdateKind::CallbackQuery(CallbackQuery {
                id: "q".into(),
                data: Some("vote:1".into()),
                ..Default::default()
            }),
        );
        assert_eq!(text(&cb), Some("vote:1"));
    }
}
