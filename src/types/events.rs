//! Push-channel events

use crate::types::wire::ChatReply;
use serde::{Deserialize, Serialize};

/// Event carried by a server-push channel, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Human-readable status while the backend works. Does not end the turn.
    Progress {
        #[serde(default)]
        message: String,
    },

    /// Final payload; same shape as a synchronous chat reply.
    Result { data: ChatReply },

    /// Backend-reported failure.
    Error {
        #[serde(default)]
        message: String,
    },

    /// Out-of-band initialization output, appended directly to the transcript.
    AutoInit {
        #[serde(default)]
        message: String,
    },
}

impl StreamEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Result { .. } => "result",
            StreamEvent::Error { .. } => "error",
            StreamEvent::AutoInit { .. } => "auto_init",
        }
    }
}
