//! Middleware and method traits.
//!
//! Both are implemented automatically for async closures, so most code never
//! names these traits:
//!
//! ```rust,ignore
//! // A middleware: inspects the update and decides whether to go on.
//! let only_private = |update: Arc<Update>, _answer: Answer| async move {
//!     let private = filter::message(&update).is_some_and(|m| m.chat.chat_type == "private");
//!     Ok::<_, BoxError>(if private { Flow::Continue } else { Flow::Halt })
//! };
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tower::BoxError;

use crate::answer::Answer;
use nestgram_core::Update;

/// Result of a controller method.
pub type HandlerResult = Result<(), BoxError>;

// ============================================================================
// Middleware
// ============================================================================

/// Decision returned by a middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next middleware, or the method if this was the last one.
    Continue,
    /// Stop here. Neither later middlewares nor the method run.
    Halt,
}

/// A step run before a controller method.
///
/// Errors are treated like errors of the method itself: the entry fails, the
/// failure is logged, and dispatch moves on to the next entry.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Inspects the update and returns whether processing continues.
    async fn handle(&self, update: Arc<Update>, answer: Answer) -> Result<Flow, BoxError>;
}

#[async_trait]
impl<F, Fut, E> Middleware for F
where
    F: Fn(Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow, E>> + Send,
    E: Into<BoxError>,
{
    async fn handle(&self, update: Arc<Update>, answer: Answer) -> Result<Flow, BoxError> {
        (self)(update, answer).await.map_err(Into::into)
    }
}

/// Type-erased, shareable [`Middleware`].
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Boxes a middleware for storage in an entry.
pub fn boxed_middleware(middleware: impl Middleware) -> BoxedMiddleware {
    Arc::new(middleware)
}

// ============================================================================
// Methods
// ============================================================================

/// A controller method with its controller already bound.
pub type MethodFn = Arc<dyn Fn(Arc<Update>, Answer) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Boxes a method closure that already has its controller bound.
pub fn method_fn<F, Fut, E>(method: F) -> MethodFn
where
    F: Fn(Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Arc::new(
        move |update: Arc<Update>, answer: Answer| -> BoxFuture<'static, HandlerResult> {
            let fut = method(update, answer);
            Box::pin(async move { fut.await.map_err(Into::into) })
        },
    )
}

/// Binds a method closure to its controller instance.
pub(crate) fn bind_method<C, F, Fut, E>(controller: Arc<C>, method: F) -> MethodFn
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    method_fn(move |update, answer| method(Arc::clone(&controller), update, answer))
}
