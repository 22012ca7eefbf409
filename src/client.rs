//! The conversation facade.
//!
//! [`AgentSessions`] is the only type most embedders touch: it owns the mode
//! registry, routes each send through session binding, dispatch and the deadline
//! guard, and reports every visible change to a [`crate::NotificationSink`].
//! Implementation details are split into submodules under `src/client/`.

mod auto_init;
pub mod builder;
pub mod core;
pub mod types;

pub use builder::AgentSessionsBuilder;
pub use core::AgentSessions;
pub use types::{ConversationSnapshot, SendOutcome, SwitchOutcome};
