//! Session binding: one backend session id per conversation, tied to a resource.
//!
//! The binding itself is plain state. Starting a session is split in two so the
//! network call can run without holding the conversation: [`SessionBinding::request`]
//! hands out a [`StartTicket`] stamped with the binding's epoch, and
//! [`SessionBinding::complete_start`] applies the result only if nothing invalidated
//! the binding in between.

use crate::types::wire::SessionStarted;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What a caller must do to obtain a usable session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// A session already exists for the current resource.
    Ready(String),
    /// A session start is required.
    Start(StartTicket),
}

/// Permission to start a session for a specific binding epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTicket {
    pub resource_ref: Option<String>,
    epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SessionBinding {
    session_id: Option<String>,
    resource_ref: Option<String>,
    display_name: Option<String>,
    /// Bumped whenever the session is invalidated; stale start results are rejected by it.
    epoch: u64,
    /// Cancelled on invalidation; background work for this epoch runs under it.
    scope: CancellationToken,
}

impl SessionBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_ref(resource_ref: Option<String>) -> Self {
        Self {
            resource_ref,
            ..Self::default()
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn resource_ref(&self) -> Option<&str> {
        self.resource_ref.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Token cancelled when the current epoch ends.
    pub fn scope(&self) -> CancellationToken {
        self.scope.clone()
    }

    /// Fast path when a session exists for the current resource, otherwise a start ticket.
    pub fn request(&self) -> SessionRequest {
        match &self.session_id {
            Some(id) => SessionRequest::Ready(id.clone()),
            None => SessionRequest::Start(StartTicket {
                resource_ref: self.resource_ref.clone(),
                epoch: self.epoch,
            }),
        }
    }

    /// Whether nothing invalidated the binding since `ticket` was issued.
    pub fn is_current(&self, ticket: &StartTicket) -> bool {
        ticket.epoch == self.epoch && ticket.resource_ref == self.resource_ref
    }

    /// Apply a successful start. Returns `false` (and changes nothing) when the binding
    /// was invalidated after the ticket was issued.
    pub fn complete_start(&mut self, ticket: &StartTicket, started: &SessionStarted) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "discarding session start for an invalidated binding"
            );
            return false;
        }
        info!(
            session_id = started.session_id.as_str(),
            resource_ref = self.resource_ref.as_deref().unwrap_or("-"),
            "session bound"
        );
        self.session_id = Some(started.session_id.clone());
        self.display_name = started.display_name.clone();
        true
    }

    /// Switch to another resource. A different value drops the session immediately.
    /// Returns `true` if the session was invalidated.
    pub fn on_resource_ref_changed(&mut self, new_ref: Option<String>) -> bool {
        if new_ref == self.resource_ref {
            return false;
        }
        debug!(
            from = self.resource_ref.as_deref().unwrap_or("-"),
            to = new_ref.as_deref().unwrap_or("-"),
            "resource changed, invalidating session"
        );
        self.resource_ref = new_ref;
        self.invalidate();
        true
    }

    /// The backend handed out a new id for the same server-side conversation.
    pub fn rotate(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            debug!(session_id, "session id rotated by backend");
            self.session_id = Some(session_id.to_string());
        }
    }

    /// Drop the session id, keeping the resource selection.
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.display_name = None;
        self.epoch = self.epoch.wrapping_add(1);
        std::mem::take(&mut self.scope).cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> SessionStarted {
        SessionStarted {
            session_id: id.to_string(),
            display_name: Some("Warehouse A".to_string()),
            initialization_message: None,
        }
    }

    fn ticket_of(binding: &SessionBinding) -> StartTicket {
        match binding.request() {
            SessionRequest::Start(t) => t,
            SessionRequest::Ready(id) => panic!("unexpected ready session {id}"),
        }
    }

    #[test]
    fn reuses_session_for_same_resource() {
        let mut b = SessionBinding::with_resource_ref(Some("conn-1".into()));
        let ticket = ticket_of(&b);
        assert_eq!(ticket.resource_ref.as_deref(), Some("conn-1"));
        assert!(b.complete_start(&ticket, &started("s-1")));

        assert_eq!(b.request(), SessionRequest::Ready("s-1".into()));
        assert!(!b.on_resource_ref_changed(Some("conn-1".into())));
        assert_eq!(b.request(), SessionRequest::Ready("s-1".into()));
        assert_eq!(b.display_name(), Some("Warehouse A"));
    }

    #[test]
    fn resource_change_invalidates_synchronously() {
        let mut b = SessionBinding::with_resource_ref(Some("conn-1".into()));
        let ticket = ticket_of(&b);
        b.complete_start(&ticket, &started("s-1"));

        assert!(b.on_resource_ref_changed(Some("conn-2".into())));
        assert_eq!(b.session_id(), None);
        assert_eq!(b.resource_ref(), Some("conn-2"));
        let fresh = ticket_of(&b);
        assert_eq!(fresh.resource_ref.as_deref(), Some("conn-2"));
    }

    #[test]
    fn start_for_old_resource_is_discarded() {
        let mut b = SessionBinding::with_resource_ref(Some("conn-1".into()));
        let stale = ticket_of(&b);
        b.on_resource_ref_changed(Some("conn-2".into()));

        assert!(!b.complete_start(&stale, &started("s-old")));
        assert_eq!(b.session_id(), None);
    }

    #[test]
    fn invalidate_then_change_back_still_rejects_old_ticket() {
        let mut b = SessionBinding::with_resource_ref(Some("conn-1".into()));
        let stale = ticket_of(&b);
        b.on_resource_ref_changed(Some("conn-2".into()));
        b.on_resource_ref_changed(Some("conn-1".into()));

        assert!(!b.complete_start(&stale, &started("s-old")));
        let fresh = ticket_of(&b);
        assert!(b.complete_start(&fresh, &started("s-new")));
        assert_eq!(b.session_id(), Some("s-new"));
    }

    #[test]
    fn invalidation_cancels_scope_and_bumps_epoch() {
        let mut b = SessionBinding::with_resource_ref(Some("conn-1".into()));
        let before = b.scope();
        let epoch = b.epoch();

        assert!(!b.on_resource_ref_changed(Some("conn-1".into())));
        assert!(!before.is_cancelled());
        assert_eq!(b.epoch(), epoch);

        b.on_resource_ref_changed(Some("conn-2".into()));
        assert!(before.is_cancelled());
        assert_eq!(b.epoch(), epoch + 1);
        assert!(!b.scope().is_cancelled());
    }

    #[test]
    fn rotation_replaces_id() {
        let mut b = SessionBinding::new();
        let ticket = ticket_of(&b);
        b.complete_start(&ticket, &started("s-1"));
        b.rotate("s-2");
        assert_eq!(b.session_id(), Some("s-2"));
    }
}
