//! # NestGram
//!
//! A bot framework for the Telegram Bot API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌─────────────────────────────┐
//! │ Polling loop │────▶│            │────▶│ open scope? scope handlers  │──▶ middlewares ──▶ method
//! └──────────────┘     │ Dispatcher │     │                             │
//! ┌──────────────┐     │            │     │ otherwise global handlers   │──▶ middlewares ──▶ method
//! │ Webhook      │────▶│            │     └─────────────────────────────┘
//! └──────────────┘     └────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, starts an update source, shuts down
//!   gracefully
//! - **Dispatcher**: routes each update and isolates handler failures
//! - **Modules**: group controllers and import each other
//! - **Controllers**: async methods bound to one shared instance
//! - **Scopes**: multi-step conversations entered per chat member
//! - **Answer**: per-update facade that fills in chat and user ids
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nestgram::prelude::*;
//!
//! struct Greeter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Module::new("app").controller(Controller::new(Greeter).route(
//!         Route::message("start", |_this: Arc<Greeter>, _update: Arc<Update>, answer: Answer| async move {
//!             answer.send("Hello!").await?;
//!             Ok::<_, BoxError>(())
//!         })
//!         .command("start"),
//!     ));
//!
//!     NestGram::builder().module(app).build()?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `nestgram.toml` files (default)
//! - `json-log`: JSON log output

pub use nestgram_core as core;
pub use nestgram_framework as framework;
pub use nestgram_runtime as runtime;
pub use nestgram_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use nestgram::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use nestgram_runtime::{NestGram, NestGramConfig, RunType};

    // Registration
    pub use nestgram_framework::predicate;
    pub use nestgram_framework::{BoxError, Controller, Flow, Middleware, Module, Route};

    // Handler parameters
    pub use nestgram_framework::Answer;
    pub use nestgram_core::filter;
    pub use nestgram_core::{
        Api, ApiError, ChatAction, ChatId, Message, SendOptions, Update, UpdateKind, UpdateType,
    };
}
