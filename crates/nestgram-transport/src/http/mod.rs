//! HTTP transports.
//!
//! This module provides the API client and the webhook listener.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{DEFAULT_BASE_URL, HttpApi};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{SECRET_TOKEN_HEADER, WebhookHandle, WebhookServer};
