//! Conversation state types

use crate::types::mode::{ConversationMode, DispatchKind};
use crate::types::message::Message;
use crate::Error;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Monotonic per-conversation turn number.
pub type TurnId = u64;

/// Observable state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    /// User message recorded; session being ensured.
    AwaitingDispatch,
    Synchronous,
    Streaming,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPhase {
    AwaitingDispatch,
    Dispatched(DispatchKind),
}

/// The in-flight operation of a conversation. At most one exists at a time.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub turn: TurnId,
    pub phase: PendingPhase,
    pub started_at: Instant,
    pub deadline: Option<Instant>,
    /// Live status from `progress` events, shown until the turn resolves.
    pub progress_text: Option<String>,
    /// Session binding epoch the turn was dispatched under.
    pub binding_epoch: u64,
    pub(crate) cancel: CancellationToken,
}

impl PendingOperation {
    pub fn kind(&self) -> Option<DispatchKind> {
        match self.phase {
            PendingPhase::AwaitingDispatch => None,
            PendingPhase::Dispatched(kind) => Some(kind),
        }
    }
}

/// Handed out by an accepted send; carries the identity later results are matched against.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    pub mode: ConversationMode,
    pub turn: TurnId,
    pub text: String,
    pub user_message: Message,
    pub cancel: CancellationToken,
}

/// What applying a turn result did to the transcript.
#[derive(Debug)]
pub enum TurnCompletion {
    Replied(Message),
    Failed { message: Message, error: Error },
    /// The turn no longer owns the conversation (reset, cancelled); nothing was applied.
    Stale,
}
