//! Conversation scopes.
//!
//! A scope is a named, ordered handler list that temporarily replaces the
//! global handlers for one `(chat_id, user_id)` pair. Each pair moves through a
//! two-state machine:
//!
//! ```text
//!            enter(name)              exit()
//!   NONE ──────────────────▶ IN_SCOPE(name) ──────▶ NONE
//!                              │     ▲
//!                              └─────┘ enter(other): last enter wins
//! ```
//!
//! There is no implicit expiry, and sessions live only in memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::entry::HandlerEntry;
use crate::error::{FrameworkError, FrameworkResult};
use nestgram_core::{Update, filter};

/// Key of a scope session.
pub type SessionKey = (i64, i64);

/// A named handler list, registered once at startup.
#[derive(Clone)]
pub struct ScopeDefinition {
    name: String,
    handlers: Vec<HandlerEntry>,
}

impl ScopeDefinition {
    /// Creates a scope definition.
    pub fn new(name: impl Into<String>, handlers: Vec<HandlerEntry>) -> Self {
        Self {
            name: name.into(),
            handlers,
        }
    }

    /// Returns the scope name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the handlers, in registration order.
    pub fn handlers(&self) -> &[HandlerEntry] {
        &self.handlers
    }
}

impl std::fmt::Debug for ScopeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeDefinition")
            .field("name", &self.name)
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

/// An open scope for one chat member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSession {
    pub chat_id: i64,
    pub user_id: i64,
    pub scope_name: String,
    pub opened_at: SystemTime,
}

/// Registered scopes plus the open session of every chat member.
///
/// Owned by one bot instance and shared with its dispatcher and every
/// [`Answer`](crate::Answer) behind an `Arc`.
#[derive(Default)]
pub struct ScopeStore {
    definitions: RwLock<HashMap<String, Arc<ScopeDefinition>>>,
    sessions: DashMap<SessionKey, ScopeSession>,
}

impl ScopeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scope.
    ///
    /// # Errors
    /// [`FrameworkError::DuplicateScope`] if the name is taken.
    pub fn register_scope(&self, definition: ScopeDefinition) -> FrameworkResult<()> {
        let mut definitions = self.definitions.write();
        if definitions.contains_key(definition.name()) {
            return Err(FrameworkError::DuplicateScope(definition.name().to_string()));
        }
        debug!(
            scope = %definition.name(),
            handler_count = definition.handlers().len(),
            "Registered scope"
        );
        definitions.insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    /// Returns whether a scope with this name is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// Returns the number of registered scopes.
    pub fn scope_count(&self) -> usize {
        self.definitions.read().len()
    }

    /// Opens a session, replacing any session already open for the key.
    ///
    /// # Errors
    /// [`FrameworkError::UnknownScope`] if no scope has this name.
    pub fn enter(&self, chat_id: i64, user_id: i64, scope_name: &str) -> FrameworkResult<()> {
        if !self.is_registered(scope_name) {
            return Err(FrameworkError::UnknownScope(scope_name.to_string()));
        }

        let session = ScopeSession {
            chat_id,
            user_id,
            scope_name: scope_name.to_string(),
            opened_at: SystemTime::now(),
        };
        if let Some(previous) = self.sessions.insert((chat_id, user_id), session) {
            debug!(
                chat_id,
                user_id,
                from = %previous.scope_name,
                to = %scope_name,
                "Replaced open scope"
            );
        } else {
            debug!(chat_id, user_id, scope = %scope_name, "Entered scope");
        }
        Ok(())
    }

    /// Closes the session for the key, returning it. No-op if none is open.
    pub fn exit(&self, chat_id: i64, user_id: i64) -> Option<ScopeSession> {
        let closed = self.sessions.remove(&(chat_id, user_id)).map(|(_, s)| s);
        if let Some(session) = &closed {
            debug!(chat_id, user_id, scope = %session.scope_name, "Exited scope");
        }
        closed
    }

    /// Returns a copy of the open session for the key.
    pub fn session(&self, chat_id: i64, user_id: i64) -> Option<ScopeSession> {
        self.sessions.get(&(chat_id, user_id)).map(|s| s.clone())
    }

    /// Returns the number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns the scope whose handlers should process this update, or `None`
    /// when the global handlers apply.
    pub fn resolve(&self, update: &Update) -> Option<Arc<ScopeDefinition>> {
        let (chat_id, user_id) = filter::session_key(update)?;
        let scope_name = self.sessions.get(&(chat_id, user_id))?.scope_name.clone();
        self.definitions.read().get(&scope_name).cloned()
    }
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("scope_count", &self.scope_count())
            .field("session_count", &self.session_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestgram_core::{Chat, Message, UpdateKind, User};

    fn update_from(chat_id: i64, user_id: i64) -> Update {
        Update::new(
            1,
            UpdateKind::Message(Message {
                message_id: 1,
                chat: Chat {
                    id: chat_id,
                    ..Default::default()
                },
                from: Some(User {
                    id: user_id,
                    ..Default::default()
                }),
                ..Default::default()
            }),
        )
    }

    fn store_with(names: &[&str]) -> ScopeStore {
        let store = ScopeStore::new();
        for name in names {
            store
                .register_scope(ScopeDefinition::new(*name, Vec::new()))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_duplicate_scope_rejected() {
        let store = store_with(&["survey"]);
        let err = store
            .register_scope(ScopeDefinition::new("survey", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, FrameworkError::DuplicateScope(name) if name == "survey"));
        assert_eq!(store.scope_count(), 1);
    }

    #[test]
    fn test_enter_resolve_exit() {
        let store = store_with(&["S"]);
        let update = update_from(42, 7);
        assert!(store.resolve(&update).is_none());

        store.enter(42, 7, "S").unwrap();
        assert_eq!(store.resolve(&update).unwrap().name(), "S");
        // Another member of the same chat is unaffected.
        assert!(store.resolve(&update_from(42, 8)).is_none());

        let closed = store.exit(42, 7).unwrap();
        assert_eq!(closed.scope_name, "S");
        assert!(store.resolve(&update).is_none());
        assert!(store.exit(42, 7).is_none());
    }

    #[test]
    fn test_last_enter_wins() {
        let store = store_with(&["first", "second"]);
        store.enter(1, 2, "first").unwrap();
        store.enter(1, 2, "second").unwrap();

        assert_eq!(store.session_count(), 1);
        assert_eq!(store.session(1, 2).unwrap().scope_name, "second");
        assert_eq!(store.resolve(&update_from(1, 2)).unwrap().name(), "second");
    }

    #[test]
    fn test_enter_unknown_scope() {
        let store = store_with(&[]);
        let err = store.enter(1, 2, "nope").unwrap_err();
        assert!(matches!(err, FrameworkError::UnknownScope(_)));
        assert!(store.session(1, 2).is_none());
    }

    #[test]
    fn test_update_without_user_never_resolves_scope() {
        let store = store_with(&["S"]);
        store.enter(5, 0, "S").unwrap();
        let post = Update::new(
            2,
            UpdateKind::ChannelPost(Message {
                message_id: 1,
                chat: Chat {
                    id: 5,
                    ..Default::default()
                },
                ..Default::default()
            }),
        );
        assert!(store.resolve(&post).is_none());
    }
}
