//! # Types Module
//!
//! Strongly-typed representations of everything the session layer exchanges with
//! the UI and with the agent backend.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConversationMode`] | Identity of an isolated conversation context |
//! | [`ModeProfile`] | Static per-mode properties (dispatch kind, resource requirement) |
//! | [`Message`] | Immutable transcript entry |
//! | [`ChatReply`] | Response payload of a chat turn (sync body or stream `result.data`) |
//! | [`SessionStarted`] | Response payload of a session start |
//! | [`StreamEvent`] | Tagged union of push-channel events |
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`mode`] | Conversation modes and their static profiles |
//! | [`message`] | Transcript messages |
//! | [`wire`] | Request/response payloads |
//! | [`events`] | Push-channel events |

pub mod events;
pub mod message;
pub mod mode;
pub mod wire;

pub use events::StreamEvent;
pub use message::{Message, MessageRole, Visualization};
pub use mode::{ConversationMode, DispatchKind, ModeProfile};
pub use wire::{ChatReply, ChatRequest, SessionStartRequest, SessionStarted};
