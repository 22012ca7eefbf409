use crate::conversation::{ConversationState, TurnId};
use crate::types::message::Message;
use crate::types::mode::ConversationMode;
use serde::Serialize;
use tokio::task::JoinHandle;

/// How an accepted send ended.
///
/// Refusals and failures are returned as `Err`. A failed turn still leaves its
/// failure line in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Replied(Message),
    /// The turn lost ownership of its conversation (mode switch, explicit cancel)
    /// before it resolved. Nothing was appended for it.
    Abandoned,
}

impl SendOutcome {
    pub fn reply(&self) -> Option<&Message> {
        match self {
            SendOutcome::Replied(m) => Some(m),
            SendOutcome::Abandoned => None,
        }
    }
}

/// Result of [`crate::AgentSessions::switch_mode`].
#[derive(Debug)]
pub struct SwitchOutcome {
    pub previous: ConversationMode,
    pub active: ConversationMode,
    pub abandoned_turn: Option<TurnId>,
    /// Background session start for the new mode, when one was launched.
    pub prewarm: Option<JoinHandle<crate::Result<String>>>,
}

impl SwitchOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.active
    }
}

/// Point-in-time view of one mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub mode: ConversationMode,
    pub active: bool,
    pub state: ConversationState,
    pub messages: Vec<Message>,
    pub status_text: Option<String>,
    pub session_id: Option<String>,
    pub resource_ref: Option<String>,
    pub display_name: Option<String>,
}

impl ConversationSnapshot {
    /// A turn is in flight; the send action should be disabled.
    pub fn is_busy(&self) -> bool {
        !self.state.is_idle()
    }
}
