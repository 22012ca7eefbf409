//! Mode registry: one [`Conversation`] per mode, exactly one active.

use crate::conversation::{Conversation, TurnId};
use crate::types::mode::ConversationMode;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// What a mode switch did to the mode being left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub previous: ConversationMode,
    /// Turn that was still pending in the previous mode, now abandoned.
    pub abandoned_turn: Option<TurnId>,
}

#[derive(Debug)]
pub struct ModeRegistry {
    conversations: HashMap<ConversationMode, Conversation>,
    active: ConversationMode,
    min_send_interval: Duration,
}

impl ModeRegistry {
    pub fn new(active: ConversationMode, min_send_interval: Duration) -> Self {
        let conversations = ConversationMode::ALL
            .iter()
            .map(|&m| (m, Conversation::new(m, min_send_interval)))
            .collect();
        Self {
            conversations,
            active,
            min_send_interval,
        }
    }

    pub fn active_mode(&self) -> ConversationMode {
        self.active
    }

    pub fn conversation(&self, mode: ConversationMode) -> Option<&Conversation> {
        self.conversations.get(&mode)
    }

    pub fn conversation_mut(&mut self, mode: ConversationMode) -> &mut Conversation {
        let interval = self.min_send_interval;
        self.conversations
            .entry(mode)
            .or_insert_with(|| Conversation::new(mode, interval))
    }

    pub fn active_conversation_mut(&mut self) -> &mut Conversation {
        let mode = self.active;
        self.conversation_mut(mode)
    }

    /// Make `mode` active. The mode being left is reset: its transcript, session id
    /// and pending turn are discarded, its resource selection is kept.
    ///
    /// Returns `None` when `mode` is already active.
    pub fn switch_mode(&mut self, mode: ConversationMode) -> Option<SwitchReport> {
        if mode == self.active {
            return None;
        }
        let previous = self.active;
        let abandoned_turn = self.conversation_mut(previous).reset();
        self.active = mode;
        info!(
            from = %previous,
            to = %mode,
            abandoned_turn,
            "conversation mode switched"
        );
        Some(SwitchReport {
            previous,
            abandoned_turn,
        })
    }
}
