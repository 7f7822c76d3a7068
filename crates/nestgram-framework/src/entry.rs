//! Handler entries.
//!
//! A [`HandlerEntry`] binds one controller method to the update kind it
//! accepts, an optional extra predicate, and its ordered middleware chain.
//! Entries are produced by [`Module::build`](crate::Module::build) and are
//! immutable afterwards.
//!
//! # Tower Service Integration
//!
//! `HandlerEntry` implements `tower::Service<UpdateContext>`, so tower layers
//! (timeouts, concurrency limits) can wrap a single entry:
//!
//! ```rust,ignore
//! use tower::{ServiceBuilder, ServiceExt};
//!
//! let svc = ServiceBuilder::new()
//!     .concurrency_limit(4)
//!     .service(entry.clone());
//! let outcome = svc.oneshot(UpdateContext::new(update, answer)).await?;
//! ```

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tower::{BoxError, Service};
use tracing::trace;

use crate::answer::Answer;
use crate::error::FrameworkError;
use crate::handler::{BoxedMiddleware, Flow, MethodFn};
use nestgram_core::{Update, UpdateType};

/// A type-erased update predicate.
pub type CheckFn = Arc<dyn Fn(&Update) -> bool + Send + Sync>;

/// What an entry did with an update it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Every middleware continued and the method returned `Ok`.
    Completed,
    /// The middleware at `index` returned [`Flow::Halt`].
    Halted { index: usize },
}

/// The request type of the entry service.
#[derive(Debug, Clone)]
pub struct UpdateContext {
    pub update: Arc<Update>,
    pub answer: Answer,
}

impl UpdateContext {
    pub fn new(update: Arc<Update>, answer: Answer) -> Self {
        Self { update, answer }
    }
}

struct EntryInner {
    controller: String,
    method_key: String,
    kind: Option<UpdateType>,
    check: Option<CheckFn>,
    middlewares: Vec<BoxedMiddleware>,
    method: MethodFn,
    scope: Option<String>,
    block: bool,
}

/// One registered controller method.
///
/// Cheap to clone: the data lives behind an `Arc`.
#[derive(Clone)]
pub struct HandlerEntry {
    inner: Arc<EntryInner>,
}

/// Parts of an entry, assembled by the controller builder.
pub(crate) struct EntryParts {
    pub controller: String,
    pub method_key: String,
    pub kind: Option<UpdateType>,
    pub check: Option<CheckFn>,
    pub middlewares: Vec<BoxedMiddleware>,
    pub method: MethodFn,
    pub scope: Option<String>,
    pub block: bool,
}

impl HandlerEntry {
    pub(crate) fn from_parts(parts: EntryParts) -> Self {
        Self {
            inner: Arc::new(EntryInner {
                controller: parts.controller,
                method_key: parts.method_key,
                kind: parts.kind,
                check: parts.check,
                middlewares: parts.middlewares,
                method: parts.method,
                scope: parts.scope,
                block: parts.block,
            }),
        }
    }

    /// Name of the owning controller.
    pub fn controller(&self) -> &str {
        &self.inner.controller
    }

    /// Key of the bound method.
    pub fn method_key(&self) -> &str {
        &self.inner.method_key
    }

    /// Accepted update kind; `None` accepts every kind.
    pub fn kind(&self) -> Option<UpdateType> {
        self.inner.kind
    }

    /// Owning scope, for entries of scope controllers.
    pub fn scope(&self) -> Option<&str> {
        self.inner.scope.as_deref()
    }

    /// Whether later entries are skipped once this one completes.
    pub fn is_blocking(&self) -> bool {
        self.inner.block
    }

    pub fn middleware_count(&self) -> usize {
        self.inner.middlewares.len()
    }

    /// Returns whether this entry accepts the update.
    pub fn matches(&self, update: &Update) -> bool {
        if self.inner.kind.is_some_and(|kind| kind != update.update_type()) {
            return false;
        }
        self.inner.check.as_ref().is_none_or(|check| check(update))
    }

    /// Runs the middleware chain, then the method.
    ///
    /// Does not check [`matches`](Self::matches). Panics are caught and
    /// returned as [`FrameworkError::HandlerPanicked`].
    pub async fn execute(
        &self,
        update: Arc<Update>,
        answer: Answer,
    ) -> Result<EntryOutcome, BoxError> {
        let inner = Arc::clone(&self.inner);
        let run = async move {
            for (index, middleware) in inner.middlewares.iter().enumerate() {
                let flow = middleware
                    .handle(Arc::clone(&update), answer.clone())
                    .await?;
                if flow == Flow::Halt {
                    trace!(
                        controller = %inner.controller,
                        method = %inner.method_key,
                        index,
                        "Middleware halted the chain"
                    );
                    return Ok(EntryOutcome::Halted { index });
                }
            }
            (inner.method)(update, answer).await?;
            Ok::<_, BoxError>(EntryOutcome::Completed)
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(FrameworkError::panicked(
                &self.inner.controller,
                &self.inner.method_key,
                payload,
            )
            .into()),
        }
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("controller", &self.inner.controller)
            .field("method_key", &self.inner.method_key)
            .field("kind", &self.inner.kind)
            .field("scope", &self.inner.scope)
            .field("middleware_count", &self.inner.middlewares.len())
            .field("block", &self.inner.block)
            .finish()
    }
}

// ============================================================================
// Tower Service Implementation for HandlerEntry
// ============================================================================

impl Service<UpdateContext> for HandlerEntry {
    type Response = EntryOutcome;
    type Error = BoxError;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: UpdateContext) -> Self::Future {
        let entry = self.clone();
        Box::pin(async move { entry.execute(ctx.update, ctx.answer).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{boxed_middleware, method_fn};
    use crate::scope::ScopeStore;
    use crate::testing::{MockApi, message_update};
    use nestgram_core::Api;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, name: &'static str, flow: Flow) -> BoxedMiddleware {
        let log = Arc::clone(log);
        boxed_middleware(move |_update: Arc<Update>, _answer: Answer| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(name.to_string());
                Ok::<_, BoxError>(flow)
            }
        })
    }

    fn entry(log: &Log, middlewares: Vec<BoxedMiddleware>, fail: bool) -> HandlerEntry {
        let log = Arc::clone(log);
        let method = method_fn(move |_update: Arc<Update>, _answer: Answer| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push("M".to_string());
                if fail {
                    Err::<(), BoxError>("method failed".into())
                } else {
                    Ok(())
                }
            }
        });
        HandlerEntry::from_parts(EntryParts {
            controller: "Test".into(),
            method_key: "run".into(),
            kind: Some(UpdateType::Message),
            check: None,
            middlewares,
            method,
            scope: None,
            block: false,
        })
    }

    fn context() -> UpdateContext {
        let update = Arc::new(message_update(1, 42, 7, "hi"));
        let answer = Answer::new(
            Arc::clone(&update),
            Api::from_arc(MockApi::new()),
            Arc::new(ScopeStore::new()),
        );
        UpdateContext::new(update, answer)
    }

    #[tokio::test]
    async fn test_middlewares_run_in_order_before_method() {
        let log: Log = Arc::default();
        let entry = entry(
            &log,
            vec![
                recording(&log, "A", Flow::Continue),
                recording(&log, "B", Flow::Continue),
            ],
            false,
        );

        let outcome = entry.oneshot(context()).await.unwrap();
        assert_eq!(outcome, EntryOutcome::Completed);
        assert_eq!(*log.lock(), ["A", "B", "M"]);
    }

    #[tokio::test]
    async fn test_halt_stops_chain() {
        let log: Log = Arc::default();
        let entry = entry(
            &log,
            vec![
                recording(&log, "A", Flow::Halt),
                recording(&log, "B", Flow::Continue),
            ],
            false,
        );

        let outcome = entry.oneshot(context()).await.unwrap();
        assert_eq!(outcome, EntryOutcome::Halted { index: 0 });
        assert_eq!(*log.lock(), ["A"]);
    }

    #[tokio::test]
    async fn test_method_error_is_returned() {
        let log: Log = Arc::default();
        let err = entry(&log, Vec::new(), true)
            .oneshot(context())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "method failed");
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let method = method_fn(|update: Arc<Update>, _answer: Answer| async move {
            if update.update_id > 0 {
                panic!("boom");
            }
            Ok::<(), BoxError>(())
        });
        let entry = HandlerEntry::from_parts(EntryParts {
            controller: "Panicky".into(),
            method_key: "explode".into(),
            kind: None,
            check: None,
            middlewares: Vec::new(),
            method,
            scope: None,
            block: false,
        });

        let ctx = context();
        let err = entry.execute(ctx.update, ctx.answer).await.unwrap_err();
        let err = err.downcast::<FrameworkError>().unwrap();
        assert!(matches!(
            *err,
            FrameworkError::HandlerPanicked { ref message, .. } if message == "boom"
        ));
    }

    #[test]
    fn test_matches_declared_kind() {
        let log: Log = Arc::default();
        let message = message_update(1, 1, 1, "/start");
        let post = Update::new(2, nestgram_core::UpdateKind::Unknown(serde_json::Value::Null));

        let by_kind = entry(&log, Vec::new(), false);
        assert!(by_kind.matches(&message));
        assert!(!by_kind.matches(&post));
    }
}
