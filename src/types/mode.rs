//! Conversation modes and their static dispatch properties

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a chat turn is delivered to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchKind {
    /// One request, one response body.
    Synchronous,
    /// Server-push channel with progress events followed by a final result.
    Streaming,
}

impl DispatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchKind::Synchronous => "sync",
            DispatchKind::Streaming => "stream",
        }
    }
}

/// Static properties of a mode. Decided once per mode, never per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    pub dispatch: DispatchKind,
    /// The backend needs an external resource (e.g. a warehouse connection) to start a session.
    pub requires_resource: bool,
}

/// An isolated conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationMode {
    /// General-purpose assistant chat.
    General,
    /// Data-dictionary agent working against a chosen warehouse connection.
    #[serde(alias = "data_model")]
    DataModel,
}

impl ConversationMode {
    pub const ALL: [ConversationMode; 2] = [ConversationMode::General, ConversationMode::DataModel];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationMode::General => "general",
            ConversationMode::DataModel => "datamodel",
        }
    }

    pub fn profile(&self) -> ModeProfile {
        match self {
            ConversationMode::General => ModeProfile {
                dispatch: DispatchKind::Synchronous,
                requires_resource: false,
            },
            // Every turn may need to (re)open the warehouse connection, which can take minutes.
            ConversationMode::DataModel => ModeProfile {
                dispatch: DispatchKind::Streaming,
                requires_resource: true,
            },
        }
    }
}

impl Default for ConversationMode {
    fn default() -> Self {
        ConversationMode::General
    }
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(ConversationMode::General),
            "datamodel" | "data_model" | "data-model" => Ok(ConversationMode::DataModel),
            other => Err(crate::Error::validation_with_context(
                format!("unknown conversation mode '{}'", other),
                crate::ErrorContext::new()
                    .with_field_path("mode")
                    .with_details("expected one of: general, datamodel"),
            )),
        }
    }
}
