//! # agent-session
//!
//! Session and streaming protocol layer for chat-style agent conversations.
//!
//! ## Overview
//!
//! A conversation runs in one of several isolated *modes*. Each mode binds to a
//! stateful backend session (optionally tied to an external resource such as a
//! warehouse connection), and every outgoing message is dispatched either as a
//! single request/response call or as a server-push event stream, depending on
//! the mode. Every network step is bounded by a deadline, and a result that
//! arrives for a mode that has since been reset is dropped instead of leaking
//! into another transcript.
//!
//! ## Core Guarantees
//!
//! - **One turn at a time**: a mode accepts a new message only when no operation is pending
//! - **Ordered transcript**: assistant replies are appended in send order, never re-sorted
//! - **Lazy sessions**: a session starts on first use and is invalidated when the resource changes
//! - **Captured result wins**: a deadline never discards a final result that already arrived
//! - **Close once**: every push channel is closed exactly once, whatever the outcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_session::{AgentSessionsBuilder, ConversationMode};
//!
//! #[tokio::main]
//! async fn main() -> agent_session::Result<()> {
//!     let sessions = AgentSessionsBuilder::new()
//!         .base_url("http://localhost:8000/api")
//!         .build()?;
//!
//!     let reply = sessions.send("hello").await?;
//!     println!("{reply:?}");
//!
//!     sessions.switch_mode(ConversationMode::DataModel);
//!     sessions.set_resource_ref(ConversationMode::DataModel, Some("conn-1".to_string()));
//!     sessions.send("show databases").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`AgentSessions`] facade and its builder |
//! | [`conversation`] | Per-mode conversation state machine |
//! | [`registry`] | Mode registry with a single active mode |
//! | [`session`] | Session binding to a backend session id and resource |
//! | [`transport`] | Transport seam, HTTP implementation, push channels, adapter |
//! | [`pipeline`] | SSE decoding and stream event mapping |
//! | [`resilience`] | Deadline combinator and send debounce |
//! | [`notify`] | UI notification sinks |
//! | [`config`] | Deadlines, debounce and HTTP settings |
//! | [`types`] | Modes, messages, wire payloads and stream events |

pub mod client;
pub mod config;
pub mod conversation;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod resilience;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{
    AgentSessions, AgentSessionsBuilder, ConversationSnapshot, SendOutcome, SwitchOutcome,
};
pub use config::SessionConfig;
pub use conversation::ConversationState;
pub use notify::{Notification, NotificationSink};
pub use types::{
    events::StreamEvent,
    message::{Message, MessageRole, Visualization},
    mode::{ConversationMode, DispatchKind, ModeProfile},
    wire::{ChatReply, SessionStarted},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorKind};
