use super::state::{
    ConversationState, PendingOperation, PendingPhase, TurnCompletion, TurnId, TurnTicket,
};
use crate::resilience::Debounce;
use crate::session::SessionBinding;
use crate::types::message::{Message, Visualization};
use crate::types::mode::{ConversationMode, DispatchKind, ModeProfile};
use crate::types::wire::ChatReply;
use crate::{Error, ErrorContext, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One mode's conversation: transcript, session binding, and the pending turn.
#[derive(Debug)]
pub struct Conversation {
    mode: ConversationMode,
    profile: ModeProfile,
    messages: Vec<Message>,
    binding: SessionBinding,
    pending: Option<PendingOperation>,
    debounce: Debounce,
    next_turn: TurnId,
}

fn refused(message: impl Into<String>, field: &str) -> Error {
    Error::validation_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("conversation"),
    )
}

impl Conversation {
    pub fn new(mode: ConversationMode, min_send_interval: Duration) -> Self {
        Self {
            mode,
            profile: mode.profile(),
            messages: Vec::new(),
            binding: SessionBinding::new(),
            pending: None,
            debounce: Debounce::new(min_send_interval),
            next_turn: 1,
        }
    }

    pub fn mode(&self) -> ConversationMode {
        self.mode
    }

    pub fn profile(&self) -> ModeProfile {
        self.profile
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn binding(&self) -> &SessionBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut SessionBinding {
        &mut self.binding
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    pub fn status_text(&self) -> Option<&str> {
        self.pending.as_ref()?.progress_text.as_deref()
    }

    pub fn state(&self) -> ConversationState {
        match self.pending.as_ref().map(|p| p.phase) {
            None => ConversationState::Idle,
            Some(PendingPhase::AwaitingDispatch) => ConversationState::AwaitingDispatch,
            Some(PendingPhase::Dispatched(DispatchKind::Synchronous)) => {
                ConversationState::Synchronous
            }
            Some(PendingPhase::Dispatched(DispatchKind::Streaming)) => {
                ConversationState::Streaming
            }
        }
    }

    /// Whether a send would currently be accepted (ignoring the text itself).
    pub fn can_send(&self, now: Instant) -> bool {
        self.pending.is_none()
            && self.debounce.remaining(now).is_none()
            && (!self.profile.requires_resource || self.binding.resource_ref().is_some())
    }

    /// `Idle → AwaitingDispatch`. Refusals leave every piece of state untouched.
    pub fn begin_send(&mut self, text: &str, now: Instant) -> Result<TurnTicket> {
        let text = text.trim();
        if text.is_empty() {
            return Err(refused("message is empty", "send.text"));
        }
        if let Some(p) = &self.pending {
            return Err(refused(
                format!("turn {} is still in progress", p.turn),
                "send.pending",
            ));
        }
        if let Some(wait) = self.debounce.remaining(now) {
            return Err(Error::validation_with_context(
                "sending too quickly",
                ErrorContext::new()
                    .with_field_path("send.debounce")
                    .with_details(format!("retry in {}ms", wait.as_millis()))
                    .with_source("conversation"),
            ));
        }
        if self.profile.requires_resource && self.binding.resource_ref().is_none() {
            return Err(refused(
                format!("select a connection before chatting in {} mode", self.mode),
                "session.resource_ref",
            ));
        }

        let turn = self.next_turn;
        self.next_turn += 1;
        let cancel = CancellationToken::new();
        let user_message = Message::user(text);

        self.messages.push(user_message.clone());
        self.debounce.mark(now);
        self.pending = Some(PendingOperation {
            turn,
            phase: PendingPhase::AwaitingDispatch,
            started_at: now,
            deadline: None,
            progress_text: None,
            binding_epoch: self.binding.epoch(),
            cancel: cancel.clone(),
        });
        debug!(mode = %self.mode, turn, "turn accepted");

        Ok(TurnTicket {
            mode: self.mode,
            turn,
            text: text.to_string(),
            user_message,
            cancel,
        })
    }

    fn pending_for(&mut self, turn: TurnId) -> Option<&mut PendingOperation> {
        self.pending.as_mut().filter(|p| p.turn == turn)
    }

    /// `AwaitingDispatch → Synchronous | Streaming`. `false` if the turn is stale.
    pub fn begin_dispatch(
        &mut self,
        turn: TurnId,
        kind: DispatchKind,
        now: Instant,
        deadline: Duration,
    ) -> bool {
        let epoch = self.binding.epoch();
        let Some(p) = self.pending_for(turn) else {
            return false;
        };
        if p.phase != PendingPhase::AwaitingDispatch {
            return false;
        }
        p.phase = PendingPhase::Dispatched(kind);
        p.deadline = Some(now + deadline);
        p.binding_epoch = epoch;
        true
    }

    /// Update the live status text. `false` if the turn is stale or not streaming.
    pub fn set_progress(&mut self, turn: TurnId, text: &str) -> bool {
        match self.pending_for(turn) {
            Some(p) if p.phase == PendingPhase::Dispatched(DispatchKind::Streaming) => {
                p.progress_text = Some(text.to_string());
                true
            }
            _ => false,
        }
    }

    /// End a turn whose session could not be ensured. Appends nothing.
    pub fn abort_turn(&mut self, turn: TurnId) -> bool {
        if self.pending_for(turn).is_none() {
            return false;
        }
        self.pending = None;
        true
    }

    /// Apply the result of a dispatched turn and return to `Idle`.
    pub fn complete_turn(&mut self, turn: TurnId, result: Result<ChatReply>) -> TurnCompletion {
        let Some(pending) = self.pending.take() else {
            return TurnCompletion::Stale;
        };
        if pending.turn != turn {
            self.pending = Some(pending);
            return TurnCompletion::Stale;
        }
        let kind = pending.kind().unwrap_or(self.profile.dispatch);

        match result {
            Ok(reply) => {
                if let Some(id) = reply.session_id.as_deref().filter(|id| !id.is_empty()) {
                    // A session dropped mid-turn must not come back through its own reply.
                    if pending.binding_epoch == self.binding.epoch() {
                        self.binding.rotate(id);
                    } else {
                        debug!(
                            mode = %self.mode,
                            turn,
                            session_id = id,
                            "ignoring session id from an invalidated binding"
                        );
                    }
                }
                let message = Message::assistant(reply.response)
                    .with_attachment(reply.visualization.map(Visualization));
                self.messages.push(message.clone());
                TurnCompletion::Replied(message)
            }
            Err(error) => {
                let message = Message::assistant(failure_text(kind, &error));
                self.messages.push(message.clone());
                TurnCompletion::Failed { message, error }
            }
        }
    }

    /// Append an assistant message that did not come from a turn (session greeting,
    /// auto-init output).
    pub fn append_assistant(&mut self, text: impl Into<String>) -> Message {
        let message = Message::assistant(text);
        self.messages.push(message.clone());
        message
    }

    /// Abandon the pending turn, if any. Its eventual result will be dropped.
    pub fn cancel_pending(&mut self) -> Option<TurnId> {
        let pending = self.pending.take()?;
        pending.cancel.cancel();
        debug!(mode = %self.mode, turn = pending.turn, "pending turn abandoned");
        Some(pending.turn)
    }

    /// Change the resource. A turn still ensuring its session is cancelled so it
    /// cannot bind to the old resource.
    pub fn on_resource_ref_changed(&mut self, new_ref: Option<String>) -> bool {
        let invalidated = self.binding.on_resource_ref_changed(new_ref);
        if invalidated {
            if let Some(p) = &self.pending {
                if p.phase == PendingPhase::AwaitingDispatch {
                    p.cancel.cancel();
                }
            }
        }
        invalidated
    }

    /// Discard the transcript, the session id and any pending turn. The resource
    /// selection is kept.
    pub fn reset(&mut self) -> Option<TurnId> {
        let abandoned = self.cancel_pending();
        self.messages.clear();
        self.binding.invalidate();
        self.debounce.reset();
        abandoned
    }
}

fn failure_text(kind: DispatchKind, error: &Error) -> String {
    match (kind, error) {
        (DispatchKind::Synchronous, _) | (DispatchKind::Streaming, Error::Remote { .. }) => {
            error.user_summary()
        }
        (DispatchKind::Streaming, other) => format!("{} ({})", other.user_summary(), other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::TurnCompletion;
    use crate::session::SessionRequest;
    use crate::types::message::MessageRole;
    use crate::types::wire::SessionStarted;
    use crate::ErrorKind;
    use serde_json::json;

    fn general() -> Conversation {
        Conversation::new(ConversationMode::General, Duration::from_secs(1))
    }

    #[test]
    fn can_send_tracks_pending_debounce_and_resource() {
        let now = Instant::now();
        let mut c = Conversation::new(ConversationMode::DataModel, Duration::from_secs(1));
        assert!(!c.can_send(now));

        c.on_resource_ref_changed(Some("conn-1".into()));
        assert!(c.can_send(now));

        let t = c.begin_send("show databases", now).unwrap();
        assert!(!c.can_send(now + Duration::from_secs(5)));

        c.begin_dispatch(t.turn, DispatchKind::Streaming, now, Duration::from_secs(300));
        c.complete_turn(t.turn, Ok(ChatReply::text("done")));
        assert!(!c.can_send(now + Duration::from_millis(500)));
        assert!(c.can_send(now + Duration::from_secs(1)));
    }

    #[test]
    fn refusals_do_not_touch_state() {
        let mut c = general();
        let now = Instant::now();

        let err = c.begin_send("   ", now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(c.messages().is_empty());
        assert!(c.state().is_idle());

        let t = c.begin_send("hello", now).unwrap();
        assert_eq!(c.state(), ConversationState::AwaitingDispatch);

        let later = now + Duration::from_secs(5);
        let err = c.begin_send("again", later).unwrap_err();
        assert_eq!(
            err.context().and_then(|ctx| ctx.field_path.as_deref()),
            Some("send.pending")
        );
        assert_eq!(c.messages().len(), 1);
        assert_eq!(c.pending().map(|p| p.turn), Some(t.turn));
    }

    #[test]
    fn debounce_applies_between_turns() {
        let mut c = general();
        let now = Instant::now();
        let t = c.begin_send("one", now).unwrap();
        assert!(c.begin_dispatch(t.turn, DispatchKind::Synchronous, now, Duration::from_secs(30)));
        c.complete_turn(t.turn, Ok(ChatReply::text("1")));

        let err = c
            .begin_send("two", now + Duration::from_millis(500))
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|ctx| ctx.field_path.as_deref()),
            Some("send.debounce")
        );
        assert!(c.begin_send("two", now + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn resource_required_modes_refuse_without_resource() {
        let mut c = Conversation::new(ConversationMode::DataModel, Duration::ZERO);
        let err = c.begin_send("show databases", Instant::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(c.messages().is_empty());

        c.on_resource_ref_changed(Some("conn-1".into()));
        assert!(c.begin_send("show databases", Instant::now()).is_ok());
    }

    #[test]
    fn reply_appends_assistant_and_rotates_session() {
        let mut c = general();
        let now = Instant::now();
        let t = c.begin_send("hello", now).unwrap();
        c.begin_dispatch(t.turn, DispatchKind::Synchronous, now, Duration::from_secs(30));
        assert_eq!(c.state(), ConversationState::Synchronous);
        assert_eq!(
            c.pending().and_then(|p| p.deadline),
            Some(now + Duration::from_secs(30))
        );

        let reply = ChatReply {
            response: "hi".into(),
            session_id: Some("s-2".into()),
            visualization: Some(json!({"kind": "bar"})),
        };
        match c.complete_turn(t.turn, Ok(reply)) {
            TurnCompletion::Replied(m) => {
                assert_eq!(m.role, MessageRole::Assistant);
                assert_eq!(m.attachment, Some(Visualization(json!({"kind": "bar"}))));
            }
            other => panic!("unexpected completion {other:?}"),
        }
        assert!(c.state().is_idle());
        assert_eq!(c.binding().session_id(), Some("s-2"));
        let texts: Vec<_> = c.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "hi"]);
    }

    #[test]
    fn streaming_failure_carries_error_text() {
        let mut c = Conversation::new(ConversationMode::DataModel, Duration::ZERO);
        c.on_resource_ref_changed(Some("conn-1".into()));
        let now = Instant::now();
        let t = c.begin_send("show databases", now).unwrap();
        c.begin_dispatch(t.turn, DispatchKind::Streaming, now, Duration::from_secs(300));
        assert!(c.set_progress(t.turn, "Connecting"));
        assert_eq!(c.status_text(), Some("Connecting"));

        let completion = c.complete_turn(
            t.turn,
            Err(Error::timeout("chat stream", Duration::from_secs(300))),
        );
        match completion {
            TurnCompletion::Failed { message, error } => {
                assert_eq!(error.kind(), ErrorKind::Timeout);
                assert!(message.text.contains("300000ms"));
            }
            other => panic!("unexpected completion {other:?}"),
        }
        assert_eq!(c.status_text(), None);
        assert!(c.state().is_idle());
    }

    #[test]
    fn reset_makes_results_stale() {
        let mut c = general();
        let now = Instant::now();
        let t = c.begin_send("hello", now).unwrap();
        c.begin_dispatch(t.turn, DispatchKind::Synchronous, now, Duration::from_secs(30));

        assert_eq!(c.reset(), Some(t.turn));
        assert!(t.cancel.is_cancelled());
        assert!(matches!(
            c.complete_turn(t.turn, Ok(ChatReply::text("late"))),
            TurnCompletion::Stale
        ));
        assert!(c.messages().is_empty());
        assert!(!c.set_progress(t.turn, "late"));
    }

    #[test]
    fn resource_change_cancels_turn_awaiting_session() {
        let mut c = Conversation::new(ConversationMode::DataModel, Duration::ZERO);
        c.on_resource_ref_changed(Some("conn-1".into()));
        let t = c.begin_send("show databases", Instant::now()).unwrap();

        assert!(c.on_resource_ref_changed(Some("conn-2".into())));
        assert!(t.cancel.is_cancelled());
        assert!(c.abort_turn(t.turn));
        assert!(c.state().is_idle());
        assert_eq!(c.messages().len(), 1);
    }

    #[test]
    fn reply_after_resource_change_does_not_rebind_old_session() {
        let mut c = Conversation::new(ConversationMode::DataModel, Duration::ZERO);
        c.on_resource_ref_changed(Some("conn-1".into()));
        let ticket = match c.binding().request() {
            SessionRequest::Start(t) => t,
            SessionRequest::Ready(id) => panic!("unexpected ready session {id}"),
        };
        let started = SessionStarted {
            session_id: "s-old".into(),
            display_name: None,
            initialization_message: None,
        };
        assert!(c.binding_mut().complete_start(&ticket, &started));

        let now = Instant::now();
        let t = c.begin_send("show databases", now).unwrap();
        c.begin_dispatch(t.turn, DispatchKind::Streaming, now, Duration::from_secs(300));
        let dispatched_epoch = c.binding().epoch();

        assert!(c.on_resource_ref_changed(Some("conn-2".into())));
        assert!(!t.cancel.is_cancelled());
        assert_ne!(c.binding().epoch(), dispatched_epoch);

        let reply = ChatReply {
            response: "tables".into(),
            session_id: Some("s-old".into()),
            visualization: None,
        };
        assert!(matches!(
            c.complete_turn(t.turn, Ok(reply)),
            TurnCompletion::Replied(_)
        ));
        assert_eq!(c.binding().session_id(), None);
        assert_eq!(c.binding().resource_ref(), Some("conn-2"));
        assert_eq!(c.messages().len(), 2);
    }
}
