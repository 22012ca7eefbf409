//! Per-mode conversation state machine
//!
//! ```text
//! Idle ──send──▶ AwaitingDispatch ──session ok──▶ Synchronous ─┐
//!  ▲  ╲ (refused: blank, busy,      │               Streaming ──┤
//!  │   ╲ debounce, no resource)     │ session failed            │ reply / failure
//!  └────┴───────────────────────────┴───────────────────────────┘
//! ```
//!
//! Transitions are synchronous and never suspend; the caller performs the network
//! calls between them and feeds results back keyed by [`TurnId`].

mod machine;
pub mod state;

pub use machine::Conversation;
pub use state::{
    ConversationState, PendingOperation, PendingPhase, TurnCompletion, TurnId, TurnTicket,
};
