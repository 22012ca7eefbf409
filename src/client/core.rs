use crate::client::types::{ConversationSnapshot, SendOutcome, SwitchOutcome};
use crate::config::SessionConfig;
use crate::conversation::{ConversationState, TurnCompletion, TurnId, TurnTicket};
use crate::notify::{Notification, NotificationSink};
use crate::registry::ModeRegistry;
use crate::resilience::with_deadline;
use crate::session::SessionRequest;
use crate::transport::adapter::{Invocation, TransportAdapter};
use crate::types::message::Message;
use crate::types::mode::{ConversationMode, DispatchKind};
use crate::types::wire::{ChatReply, ChatRequest};
use crate::{Error, ErrorContext, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) struct Inner {
    pub(crate) config: SessionConfig,
    pub(crate) adapter: TransportAdapter,
    pub(crate) registry: Mutex<ModeRegistry>,
    pub(crate) sink: Arc<dyn NotificationSink>,
}

/// Multi-mode agent conversation client.
///
/// Cheap to clone; clones share state. Every transition runs under a short lock that
/// is never held across a suspension point, so results arriving from the network are
/// applied to the mode captured when the turn was sent, never to whatever mode is
/// active by then.
#[derive(Clone)]
pub struct AgentSessions {
    pub(crate) inner: Arc<Inner>,
}

impl AgentSessions {
    pub(crate) fn from_parts(
        config: SessionConfig,
        adapter: TransportAdapter,
        registry: ModeRegistry,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                registry: Mutex::new(registry),
                sink,
            }),
        }
    }

    pub fn builder() -> crate::client::builder::AgentSessionsBuilder {
        crate::client::builder::AgentSessionsBuilder::new()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut ModeRegistry) -> R) -> R {
        let mut registry = self
            .inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut registry)
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.inner.sink.notify(notification);
    }

    fn report_error(&self, mode: ConversationMode, error: &Error) {
        self.notify(Notification::Error {
            mode,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn active_mode(&self) -> ConversationMode {
        self.with_registry(|r| r.active_mode())
    }

    /// Send `text` in the active mode and wait for the turn to resolve.
    ///
    /// Refused sends (blank text, a turn already pending, inside the debounce
    /// interval, no resource selected where one is required) return a validation
    /// error and change nothing. A failed session start returns the session error
    /// without an assistant message. A failed dispatch returns its error after the
    /// failure line has been appended.
    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        let (mode, accepted) = self.with_registry(|r| {
            let mode = r.active_mode();
            (mode, r.conversation_mut(mode).begin_send(text, Instant::now()))
        });
        let ticket = match accepted {
            Ok(ticket) => ticket,
            Err(e) => {
                debug!(mode = %mode, error = %e, "send refused");
                self.report_error(mode, &e);
                return Err(e);
            }
        };
        self.notify(Notification::MessageAppended {
            mode,
            message: ticket.user_message.clone(),
        });
        self.run_turn(ticket).await
    }

    async fn run_turn(&self, ticket: TurnTicket) -> Result<SendOutcome> {
        let TurnTicket {
            mode,
            turn,
            text,
            cancel,
            ..
        } = ticket;
        let started = Instant::now();

        let session_id = match self.ensure_session_for(mode, &cancel).await {
            Ok(id) => id,
            Err(err) => {
                let owned = self.with_registry(|r| r.conversation_mut(mode).abort_turn(turn));
                if !owned {
                    debug!(mode = %mode, turn, "session outcome dropped for an abandoned turn");
                    return Ok(SendOutcome::Abandoned);
                }
                warn!(mode = %mode, turn, error = %err, "turn ended before dispatch");
                self.report_error(mode, &err);
                return Err(err);
            }
        };

        let kind = mode.profile().dispatch;
        let deadline = self.inner.config.deadline_for(kind);
        let dispatched = self.with_registry(|r| {
            r.conversation_mut(mode)
                .begin_dispatch(turn, kind, Instant::now(), deadline)
        });
        if !dispatched {
            return Ok(SendOutcome::Abandoned);
        }
        debug!(mode = %mode, turn, kind = kind.as_str(), "dispatching turn");

        let result = match Invocation::chat(mode, &ChatRequest {
            session_id,
            message: text,
        }) {
            Ok(op) => self.dispatch(mode, turn, op, &cancel).await,
            Err(e) => Err(e),
        };
        self.finish_turn(mode, turn, kind, result, started)
    }

    async fn dispatch(
        &self,
        mode: ConversationMode,
        turn: TurnId,
        op: Invocation,
        cancel: &CancellationToken,
    ) -> Result<ChatReply> {
        let deadline = self.inner.config.deadline_for(op.mode);
        let operation = op.endpoint.clone();
        let adapter = self.inner.adapter.clone();
        let on_progress = move |status: &str| {
            let applied = self.with_registry(|r| r.conversation_mut(mode).set_progress(turn, status));
            if applied {
                self.notify(Notification::StatusChanged {
                    mode,
                    status: Some(status.to_string()),
                });
            }
        };

        with_deadline(&operation, deadline, cancel, |ctx| async move {
            adapter.invoke(&op, &ctx, &on_progress).await
        })
        .await
    }

    fn finish_turn(
        &self,
        mode: ConversationMode,
        turn: TurnId,
        kind: DispatchKind,
        result: Result<ChatReply>,
        started: Instant,
    ) -> Result<SendOutcome> {
        let completion =
            self.with_registry(|r| r.conversation_mut(mode).complete_turn(turn, result));
        let duration_ms = started.elapsed().as_millis() as u64;
        let streamed = kind == DispatchKind::Streaming;

        match completion {
            TurnCompletion::Stale => {
                debug!(mode = %mode, turn, duration_ms, "dropping result of an abandoned turn");
                Ok(SendOutcome::Abandoned)
            }
            TurnCompletion::Replied(message) => {
                debug!(mode = %mode, turn, duration_ms, "turn replied");
                if streamed {
                    self.notify(Notification::StatusChanged { mode, status: None });
                }
                self.notify(Notification::MessageAppended {
                    mode,
                    message: message.clone(),
                });
                Ok(SendOutcome::Replied(message))
            }
            TurnCompletion::Failed { message, error } => {
                warn!(
                    mode = %mode,
                    turn,
                    duration_ms,
                    kind = error.kind().as_str(),
                    error = %error,
                    "turn failed"
                );
                if streamed {
                    self.notify(Notification::StatusChanged { mode, status: None });
                }
                self.notify(Notification::MessageAppended { mode, message });
                self.report_error(mode, &error);
                Err(error)
            }
        }
    }

    /// Session id for the active mode, starting a session if none is bound.
    /// A start still in flight is abandoned if the session is invalidated.
    pub async fn ensure_session(&self) -> Result<String> {
        let (mode, scope) = self.with_registry(|r| {
            let mode = r.active_mode();
            (mode, r.conversation_mut(mode).binding().scope())
        });
        self.ensure_session_for(mode, &scope).await
    }

    /// Session id for `mode`. Reuses the bound session when the resource is unchanged;
    /// otherwise starts one under the session-start deadline. A start whose binding
    /// was invalidated meanwhile is discarded and reported as a session error.
    pub async fn ensure_session_for(
        &self,
        mode: ConversationMode,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let (profile, request) = self.with_registry(|r| {
            let conv = r.conversation_mut(mode);
            (conv.profile(), conv.binding().request())
        });
        let ticket = match request {
            SessionRequest::Ready(id) => return Ok(id),
            SessionRequest::Start(ticket) => ticket,
        };
        if profile.requires_resource && ticket.resource_ref.is_none() {
            return Err(Error::validation_with_context(
                format!("select a connection before starting a {} session", mode),
                ErrorContext::new()
                    .with_field_path("session.resource_ref")
                    .with_source("session_binding"),
            ));
        }

        let adapter = self.inner.adapter.clone();
        let resource_ref = ticket.resource_ref.clone();
        let started_at = Instant::now();
        let started = with_deadline(
            "session start",
            self.inner.config.session_start_deadline(),
            cancel,
            |ctx| async move {
                adapter
                    .start_session(mode, resource_ref.as_deref(), &ctx)
                    .await
            },
        )
        .await
        .map_err(|e| {
            warn!(mode = %mode, error = %e, "session start failed");
            Error::session(format!("could not start a {} session", mode), e)
        })?;

        enum Applied {
            Bound(Option<Message>),
            AlreadyBound(String),
            Invalidated,
        }
        let applied = self.with_registry(|r| {
            let conv = r.conversation_mut(mode);
            if !conv.binding().is_current(&ticket) {
                return Applied::Invalidated;
            }
            if let Some(id) = conv.binding().session_id() {
                return Applied::AlreadyBound(id.to_string());
            }
            conv.binding_mut().complete_start(&ticket, &started);
            let greeting = started
                .initialization_message
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| conv.append_assistant(t));
            Applied::Bound(greeting)
        });

        match applied {
            Applied::Invalidated => Err(Error::session(
                format!("{} session was invalidated while starting", mode),
                Error::cancelled("session start"),
            )),
            Applied::AlreadyBound(id) => Ok(id),
            Applied::Bound(greeting) => {
                info!(
                    mode = %mode,
                    session_id = started.session_id.as_str(),
                    duration_ms = started_at.elapsed().as_millis() as u64,
                    "session started"
                );
                self.notify(Notification::SessionStarted {
                    mode,
                    session_id: started.session_id.clone(),
                });
                if let Some(message) = greeting {
                    self.notify(Notification::MessageAppended { mode, message });
                }
                if self.inner.config.follow_auto_init {
                    self.spawn_auto_init(mode, started.session_id.clone());
                }
                Ok(started.session_id)
            }
        }
    }

    /// Make `mode` active, resetting the mode being left. Never waits on the network;
    /// a pre-warm session start for the new mode runs in the background.
    pub fn switch_mode(&self, mode: ConversationMode) -> SwitchOutcome {
        let (report, wants_prewarm, scope) = self.with_registry(|r| {
            let report = r.switch_mode(mode);
            let binding = r.conversation_mut(mode).binding();
            let wants = binding.resource_ref().is_some() && binding.session_id().is_none();
            (report, wants, binding.scope())
        });
        let Some(report) = report else {
            return SwitchOutcome {
                previous: mode,
                active: mode,
                abandoned_turn: None,
                prewarm: None,
            };
        };

        if report.abandoned_turn.is_some() {
            self.notify(Notification::StatusChanged {
                mode: report.previous,
                status: None,
            });
        }
        self.notify(Notification::ModeSwitched {
            from: report.previous,
            to: mode,
        });

        let prewarm = if self.inner.config.prewarm_on_switch && wants_prewarm {
            self.spawn_prewarm(mode, scope)
        } else {
            None
        };
        SwitchOutcome {
            previous: report.previous,
            active: mode,
            abandoned_turn: report.abandoned_turn,
            prewarm,
        }
    }

    /// The start is abandoned as soon as `scope` is cancelled by the binding.
    fn spawn_prewarm(
        &self,
        mode: ConversationMode,
        scope: CancellationToken,
    ) -> Option<tokio::task::JoinHandle<Result<String>>> {
        let Ok(handle) = Handle::try_current() else {
            debug!(mode = %mode, "no runtime, skipping session pre-warm");
            return None;
        };
        let this = self.clone();
        Some(handle.spawn(async move {
            let outcome = this.ensure_session_for(mode, &scope).await;
            if let Err(e) = &outcome {
                warn!(mode = %mode, error = %e, "session pre-warm failed");
            }
            outcome
        }))
    }

    /// Select the external resource for `mode`. A different value drops the bound
    /// session immediately and cancels a session start still in flight.
    pub fn set_resource_ref(&self, mode: ConversationMode, resource_ref: Option<String>) -> bool {
        let changed = self.with_registry(|r| {
            r.conversation_mut(mode)
                .on_resource_ref_changed(resource_ref)
        });
        if changed {
            debug!(mode = %mode, "resource selection changed");
        }
        changed
    }

    /// Abandon the in-flight turn of `mode`. Its eventual result is dropped.
    pub fn cancel_pending(&self, mode: ConversationMode) -> Option<TurnId> {
        let cancelled = self.with_registry(|r| r.conversation_mut(mode).cancel_pending());
        if cancelled.is_some() {
            self.notify(Notification::StatusChanged { mode, status: None });
        }
        cancelled
    }

    pub fn snapshot(&self, mode: ConversationMode) -> ConversationSnapshot {
        self.with_registry(|r| {
            let active = r.active_mode() == mode;
            let conv = r.conversation_mut(mode);
            let binding = conv.binding();
            ConversationSnapshot {
                mode,
                active,
                state: conv.state(),
                messages: conv.messages().to_vec(),
                status_text: conv.status_text().map(str::to_string),
                session_id: binding.session_id().map(str::to_string),
                resource_ref: binding.resource_ref().map(str::to_string),
                display_name: binding.display_name().map(str::to_string),
            }
        })
    }

    pub fn transcript(&self, mode: ConversationMode) -> Vec<Message> {
        self.with_registry(|r| r.conversation_mut(mode).messages().to_vec())
    }

    pub fn state(&self, mode: ConversationMode) -> ConversationState {
        self.with_registry(|r| r.conversation_mut(mode).state())
    }

    pub fn status_text(&self, mode: ConversationMode) -> Option<String> {
        self.with_registry(|r| r.conversation_mut(mode).status_text().map(str::to_string))
    }
}

impl std::fmt::Debug for AgentSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSessions")
            .field("base_url", &self.inner.config.base_url)
            .field("active_mode", &self.active_mode())
            .finish()
    }
}
