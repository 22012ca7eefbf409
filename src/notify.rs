//! Notifications for the presentation layer.
//!
//! The session layer never renders anything. Transcript growth, status text changes,
//! transient errors and session lifecycle are reported through a [`NotificationSink`];
//! the embedding application decides how to show them.
//!
//! | Sink | Use |
//! |------|-----|
//! | [`NoopNotificationSink`] | default, drops everything |
//! | [`InMemoryNotificationSink`] | tests, bounded history |
//! | [`BroadcastNotificationSink`] | fan-out to async consumers |

use crate::types::message::Message;
use crate::types::mode::ConversationMode;
use crate::ErrorKind;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    MessageAppended {
        mode: ConversationMode,
        message: Message,
    },
    /// Live status text; `None` clears it.
    StatusChanged {
        mode: ConversationMode,
        status: Option<String>,
    },
    /// Transient error toast. Validation refusals are reported here too.
    Error {
        mode: ConversationMode,
        kind: ErrorKind,
        message: String,
    },
    SessionStarted {
        mode: ConversationMode,
        session_id: String,
    },
    ModeSwitched {
        from: ConversationMode,
        to: ConversationMode,
    },
}

impl Notification {
    pub fn mode(&self) -> ConversationMode {
        match self {
            Notification::MessageAppended { mode, .. }
            | Notification::StatusChanged { mode, .. }
            | Notification::Error { mode, .. }
            | Notification::SessionStarted { mode, .. } => *mode,
            Notification::ModeSwitched { to, .. } => *to,
        }
    }
}

/// Destination for notifications. Called synchronously and never while internal
/// state is locked, so implementations may call back into the session layer.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn notify(&self, _notification: Notification) {}
}

pub fn noop_sink() -> Arc<dyn NotificationSink> {
    Arc::new(NoopNotificationSink)
}

/// Keeps the most recent `max_events` notifications.
#[derive(Debug, Clone)]
pub struct InMemoryNotificationSink {
    events: Arc<RwLock<VecDeque<Notification>>>,
    max_events: usize,
}

impl InMemoryNotificationSink {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn events_for(&self, mode: ConversationMode) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|n| n.mode() == mode)
            .collect()
    }

    /// Error notifications only, as `(kind, message)`.
    pub fn errors(&self) -> Vec<(ErrorKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Error { kind, message, .. } => Some((kind, message)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryNotificationSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn notify(&self, notification: Notification) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.push_back(notification);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }
}

/// Publishes notifications on a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest entries; publishing never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastNotificationSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotificationSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastNotificationSink {
    fn notify(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.tx.send(notification);
    }
}
