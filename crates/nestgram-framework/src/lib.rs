//! # NestGram Framework
//!
//! Handler registration and update dispatch for NestGram bots.
//!
//! This layer provides:
//! - Controllers and routes: async methods bound to a shared instance
//! - Modules that group controllers and import each other
//! - Middleware chains (module → controller → route)
//! - Conversation scopes: per-member handler sets entered and left at runtime
//! - The [`Dispatcher`], which routes each update and isolates handler
//!   failures
//! - The [`Answer`] facade handed to every handler
//!
//! Nothing here talks to the network: the remote API arrives as an
//! [`Api`](nestgram_core::Api) and updates arrive through
//! [`UpdateHandler`](nestgram_core::UpdateHandler).

pub mod answer;
pub mod controller;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod handler;
pub mod lock;
pub mod module;
pub mod predicate;
pub mod scope;

#[cfg(test)]
mod testing;

pub use answer::Answer;
pub use controller::{Controller, Route};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use entry::{CheckFn, EntryOutcome, HandlerEntry, UpdateContext};
pub use error::{FrameworkError, FrameworkResult};
pub use handler::{BoxedMiddleware, Flow, HandlerResult, Middleware, boxed_middleware, method_fn};
pub use lock::{SessionGuard, SessionLocks};
pub use module::{Module, Registry};
pub use scope::{ScopeDefinition, ScopeSession, ScopeStore, SessionKey};
pub use tower::BoxError;

/// Prelude for common imports.
pub mod prelude {
    pub use super::predicate;
    pub use super::{Answer, BoxError, Controller, Flow, Module, Route};
}
