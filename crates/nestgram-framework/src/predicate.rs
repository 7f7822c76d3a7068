//! Common route predicates.
//!
//! Each function returns a closure usable with
//! [`Route::check`](crate::Route::check).

use nestgram_core::{Update, UpdateKind, filter};

/// Matches a bot command such as `/start`, `/start payload` or
/// `/start@my_bot`. `name` is given without the slash.
pub fn command(name: impl Into<String>) -> impl Fn(&Update) -> bool + Send + Sync + 'static {
    let name = name.into();
    move |update| command_of(update).is_some_and(|cmd| cmd == name)
}

/// Matches message text (or caption) equal to `text`.
pub fn text_eq(text: impl Into<String>) -> impl Fn(&Update) -> bool + Send + Sync + 'static {
    let text = text.into();
    move |update| message_text(update) == Some(text.as_str())
}

/// Matches message text (or caption) starting with `prefix`.
pub fn text_starts_with(
    prefix: impl Into<String>,
) -> impl Fn(&Update) -> bool + Send + Sync + 'static {
    let prefix = prefix.into();
    move |update| message_text(update).is_some_and(|t| t.starts_with(prefix.as_str()))
}

/// Matches a button press carrying exactly `data`.
pub fn callback_data(data: impl Into<String>) -> impl Fn(&Update) -> bool + Send + Sync + 'static {
    let data = data.into();
    move |update| match &update.kind {
        UpdateKind::CallbackQuery(q) => q.data.as_deref() == Some(data.as_str()),
        _ => false,
    }
}

/// Text of a message-like update. Callback data and inline queries are not
/// message text.
fn message_text(update: &Update) -> Option<&str> {
    match &update.kind {
        UpdateKind::CallbackQuery(_) | UpdateKind::InlineQuery(_) => None,
        _ => filter::text(update),
    }
}

/// Command name of a message, without slash and bot mention.
pub fn command_of(update: &Update) -> Option<&str> {
    let word = message_text(update)?.split_whitespace().next()?;
    let command = word.strip_prefix('/')?;
    let command = command.split('@').next().unwrap_or(command);
    (!command.is_empty()).then_some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{callback_update, message_update};

    #[test]
    fn test_command() {
        let start = command("start");
        assert!(start(&message_update(1, 1, 1, "/start")));
        assert!(start(&message_update(1, 1, 1, "/start ref-42")));
        assert!(start(&message_update(1, 1, 1, "/start@nest_bot")));
        assert!(!start(&message_update(1, 1, 1, "/starts")));
        assert!(!start(&message_update(1, 1, 1, "start")));
        assert!(!start(&callback_update(1, 1, 1, "/start")));
        assert_eq!(command_of(&message_update(1, 1, 1, "/")), None);
    }

    #[test]
    fn test_text_and_callback_data() {
        assert!(text_eq("hi")(&message_update(1, 1, 1, "hi")));
        assert!(!text_eq("hi")(&message_update(1, 1, 1, "hi there")));
        assert!(text_starts_with("hi")(&message_update(1, 1, 1, "hi there")));

        assert!(callback_data("yes")(&callback_update(1, 1, 1, "yes")));
        assert!(!callback_data("yes")(&callback_update(1, 1, 1, "no")));
        assert!(!callback_data("yes")(&message_update(1, 1, 1, "yes")));
    }
}
