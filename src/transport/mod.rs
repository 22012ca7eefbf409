//! # Transport Layer
//!
//! The network seam of the session layer. [`Transport`] is the only trait the rest of
//! the crate talks to; it offers exactly two delivery mechanisms:
//!
//! - a request/response call (`post_json`)
//! - a server-push event channel (`open_channel`)
//!
//! [`TransportAdapter`] builds the `invoke` contract on top of it: sync turns,
//! streamed turns with progress callbacks, session starts and the auto-init channel.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HttpTransport`] | reqwest-backed implementation (JSON POST + SSE GET) |
//! | [`EventChannel`] | Push channel that closes exactly once |
//! | [`TransportAdapter`] | `invoke(sync \| stream)` with event dispatch |
//! | [`ScriptedTransport`] | In-memory backend for tests and demos |

pub mod adapter;
pub mod channel;
pub mod http;
pub mod scripted;

pub use adapter::{Invocation, TransportAdapter};
pub use channel::EventChannel;
pub use http::HttpTransport;
pub use scripted::{ChannelFeed, ScriptedReply, ScriptedTransport};

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Delivery mechanisms offered by the agent backend.
///
/// Endpoints are relative paths such as `general/chat` or `datamodel/chat/stream`.
/// Dropping a returned future aborts the request; dropping or closing a returned
/// [`EventChannel`] releases the push connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One request, one JSON response body.
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value>;

    /// Open a server-push channel parameterized by `params`.
    async fn open_channel(&self, endpoint: &str, params: &[(String, String)])
        -> Result<EventChannel>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Transport error: {0}")]
    Other(String),
}
