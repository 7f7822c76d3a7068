//! # NestGram Transport
//!
//! Network transports for the NestGram bot framework.
//!
//! ## Features
//!
//! - `http-client` (default): [`HttpApi`], the [`BotApi`](nestgram_core::BotApi)
//!   implementation over HTTPS
//! - `http-server` (default): [`WebhookServer`], the listener for pushed
//!   updates
//! - `full`: Both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  nestgram-runtime   │  (polling loop, webhook orchestration)
//! ├─────────────────────┤
//! │  nestgram-core      │  (BotApi, UpdateHandler)
//! ├─────────────────────┤
//! │  nestgram-transport │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nestgram_core::Api;
//! use nestgram_transport::{HttpApi, WebhookServer};
//!
//! let api = Api::new(HttpApi::new("123:abc")?);
//! let me = api.get_me().await?;
//!
//! let handle = WebhookServer::new()
//!     .secret_token(Some("s3cret".into()))
//!     .listen("0.0.0.0:8443", Arc::new(dispatcher))
//!     .await?;
//! ```

pub mod error;

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-client")]
pub use http::{DEFAULT_BASE_URL, HttpApi};

#[cfg(feature = "http-server")]
pub use http::{SECRET_TOKEN_HEADER, WebhookHandle, WebhookServer};
