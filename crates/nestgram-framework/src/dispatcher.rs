//! Update dispatcher.
//!
//! The [`Dispatcher`] processes one update at a time, to completion, and never
//! fails:
//!
//! 1. Serialize on the update's `(chat_id, user_id)` pair (updates with no
//!    chat or user run unserialized)
//! 2. Resolve the handler set: the open scope's handlers, or the global ones
//! 3. Select entries whose update kind and predicate match, in registration
//!    order
//! 4. Run each entry's middleware chain, then its method
//! 5. Log every failure and keep going; a blocking entry that completes stops
//!    the walk
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │   Update   │──▶│  ScopeStore  │──▶│ entry: mw → mw → fn  │
//! │ (poll/hook)│   │   resolve    │   │ entry: mw → fn       │
//! └────────────┘   └──────────────┘   └──────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tower::ServiceExt;
use tracing::{Instrument, debug, error, info_span, trace};

use crate::answer::Answer;
use crate::entry::{EntryOutcome, HandlerEntry, UpdateContext};
use crate::error::FrameworkResult;
use crate::lock::SessionLocks;
use crate::module::Registry;
use crate::scope::ScopeStore;
use nestgram_core::{Api, Update, UpdateHandler, filter};

/// Counters describing what happened to one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Entries whose kind and predicate matched.
    pub matched: usize,
    /// Entries whose method ran and returned `Ok`.
    pub completed: usize,
    /// Entries stopped by a middleware.
    pub halted: usize,
    /// Entries whose middleware or method failed or panicked.
    pub failed: usize,
}

struct DispatcherInner {
    handlers: Vec<HandlerEntry>,
    scopes: Arc<ScopeStore>,
    api: Api,
    locks: SessionLocks,
}

/// Routes updates to handler entries.
///
/// Cheap to clone and safe to call concurrently.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a dispatcher over a built registry.
    ///
    /// # Errors
    /// [`FrameworkError::DuplicateScope`](crate::FrameworkError::DuplicateScope)
    /// if a scope of the registry is already known to `scopes`.
    pub fn new(registry: Registry, api: Api, scopes: Arc<ScopeStore>) -> FrameworkResult<Self> {
        let (handlers, definitions) = registry.into_parts();
        for definition in definitions {
            scopes.register_scope(definition)?;
        }

        let handlers: Vec<_> = handlers
            .into_iter()
            .filter(|entry| entry.scope().is_none())
            .collect();

        debug!(
            global_handlers = handlers.len(),
            scopes = scopes.scope_count(),
            "Dispatcher ready"
        );

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                handlers,
                scopes,
                api,
                locks: SessionLocks::new(),
            }),
        })
    }

    /// The scope store shared with every [`Answer`].
    pub fn scopes(&self) -> &Arc<ScopeStore> {
        &self.inner.scopes
    }

    /// The API handed to every [`Answer`].
    pub fn api(&self) -> &Api {
        &self.inner.api
    }

    /// Number of global (unscoped) entries.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    /// Processes one update to completion.
    pub async fn dispatch(&self, update: Update) -> DispatchOutcome {
        let span = info_span!(
            "dispatch",
            update_id = update.update_id,
            kind = %update.update_type()
        );
        self.dispatch_inner(Arc::new(update)).instrument(span).await
    }

    async fn dispatch_inner(&self, update: Arc<Update>) -> DispatchOutcome {
        let _guard = match filter::session_key(&update) {
            Some(key) => Some(self.inner.locks.acquire(key).await),
            None => None,
        };

        let scoped = self.inner.scopes.resolve(&update);
        let entries = match &scoped {
            Some(scope) => {
                trace!(scope = %scope.name(), "Using scope handlers");
                scope.handlers()
            }
            None => self.inner.handlers.as_slice(),
        };

        let answer = Answer::new(
            Arc::clone(&update),
            self.inner.api.clone(),
            Arc::clone(&self.inner.scopes),
        );

        let mut outcome = DispatchOutcome::default();
        for entry in entries.iter().filter(|entry| entry.matches(&update)) {
            outcome.matched += 1;

            let ctx = UpdateContext::new(Arc::clone(&update), answer.clone());
            match entry.clone().oneshot(ctx).await {
                Ok(EntryOutcome::Completed) => {
                    outcome.completed += 1;
                    if entry.is_blocking() {
                        debug!(
                            controller = %entry.controller(),
                            method = %entry.method_key(),
                            "Blocking entry completed, stopping dispatch"
                        );
                        break;
                    }
                }
                Ok(EntryOutcome::Halted { index }) => {
                    outcome.halted += 1;
                    trace!(
                        controller = %entry.controller(),
                        method = %entry.method_key(),
                        middleware = index,
                        "Entry halted by middleware"
                    );
                }
                Err(e) => {
                    outcome.failed += 1;
                    error!(
                        controller = %entry.controller(),
                        method = %entry.method_key(),
                        error = %e,
                        "Handler failed"
                    );
                }
            }
        }

        if outcome.matched == 0 {
            trace!("No handler matched");
        }
        outcome
    }
}

#[async_trait]
impl UpdateHandler for Dispatcher {
    async fn handle_update(&self, update: Update) {
        self.dispatch(update).await;
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_count", &self.inner.handlers.len())
            .field("scopes", &self.inner.scopes)
            .finish()
    }
}
