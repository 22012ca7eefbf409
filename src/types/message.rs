//! Transcript messages

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Opaque visualization payload attached to an assistant reply (chart spec, table, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Visualization(pub serde_json::Value);

/// A transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Visualization>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text.into(), None)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text.into(), None)
    }

    pub fn with_attachment(mut self, attachment: Option<Visualization>) -> Self {
        self.attachment = attachment;
        self
    }

    fn new(role: MessageRole, text: String, attachment: Option<Visualization>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text,
            created_at: timestamp_ms(),
            attachment,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}
