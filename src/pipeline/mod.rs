//! # Stream Pipeline
//!
//! Turns the raw bytes of a server-push channel into typed [`StreamEvent`]s.
//!
//! ```text
//! Raw Bytes → SseDecoder → SseFrame → map_frame → StreamEvent
//!     │            │                      │
//!   HTTP      framing, CRLF,          progress / result /
//!             [DONE] sentinel         error / auto_init
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Incremental SSE framing |
//! | [`event_map`] | Frame to event mapping, unknown kinds ignored |
//!
//! [`StreamEvent`]: crate::types::events::StreamEvent

pub mod decode;
pub mod event_map;

pub use decode::{SseDecoder, SseFrame};
pub use event_map::{map_frame, Mapped};
