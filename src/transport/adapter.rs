//! `invoke` over the two delivery mechanisms.

use crate::pipeline::event_map::{map_frame, Mapped};
use crate::resilience::OperationContext;
use crate::transport::{EventChannel, Transport, TransportError};
use crate::types::events::StreamEvent;
use crate::types::mode::{ConversationMode, DispatchKind};
use crate::types::wire::{ChatReply, ChatRequest, SessionStartRequest, SessionStarted};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// One backend call: where, what, and how it is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub endpoint: String,
    pub payload: Value,
    pub mode: DispatchKind,
}

impl Invocation {
    /// Chat turn for `mode`, routed by the mode's dispatch kind.
    pub fn chat(mode: ConversationMode, request: &ChatRequest) -> Result<Self> {
        let kind = mode.profile().dispatch;
        let endpoint = match kind {
            DispatchKind::Synchronous => format!("{}/chat", mode.as_str()),
            DispatchKind::Streaming => format!("{}/chat/stream", mode.as_str()),
        };
        Ok(Self {
            endpoint,
            payload: serde_json::to_value(request)?,
            mode: kind,
        })
    }

    /// Flatten an object payload into channel parameters.
    fn params(&self) -> Vec<(String, String)> {
        let Some(obj) = self.payload.as_object() else {
            return Vec::new();
        };
        obj.iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

/// Callback for live `progress` status text.
pub type ProgressFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Wraps a [`Transport`] behind the `invoke` contract.
#[derive(Clone)]
pub struct TransportAdapter {
    transport: Arc<dyn Transport>,
}

impl TransportAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Execute one chat turn.
    ///
    /// - `Synchronous`: one request, one [`ChatReply`] body.
    /// - `Streaming`: opens a push channel; `progress` events feed `on_progress`,
    ///   `result` resolves, `error` rejects, anything else is logged and skipped.
    ///
    /// The final reply is captured into `ctx` before the channel is closed, and the
    /// channel is closed exactly once on every path.
    pub async fn invoke(
        &self,
        op: &Invocation,
        ctx: &OperationContext<ChatReply>,
        on_progress: ProgressFn<'_>,
    ) -> Result<ChatReply> {
        match op.mode {
            DispatchKind::Synchronous => {
                let body = self.transport.post_json(&op.endpoint, &op.payload).await?;
                let reply: ChatReply = serde_json::from_value(body)?;
                ctx.capture(reply.clone());
                Ok(reply)
            }
            DispatchKind::Streaming => {
                let mut channel = self
                    .transport
                    .open_channel(&op.endpoint, &op.params())
                    .await?;
                let outcome = Self::drive_stream(&mut channel, ctx, on_progress).await;
                channel.close();
                outcome
            }
        }
    }

    async fn drive_stream(
        channel: &mut EventChannel,
        ctx: &OperationContext<ChatReply>,
        on_progress: ProgressFn<'_>,
    ) -> Result<ChatReply> {
        let label = channel.label().to_string();
        let mut progress_events = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => {
                    debug!(channel = label.as_str(), "stream cancelled");
                    return Err(Error::cancelled(format!("stream {}", label)));
                }
                frame = channel.next_frame() => frame,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(TransportError::ChannelClosed(format!(
                        "{} ended before a result",
                        label
                    ))
                    .into())
                }
            };

            match map_frame(frame, &label) {
                Mapped::Event(StreamEvent::Progress { message }) => {
                    progress_events += 1;
                    on_progress(&message);
                }
                Mapped::Event(StreamEvent::Result { data }) => {
                    ctx.capture(data.clone());
                    debug!(
                        channel = label.as_str(),
                        progress_events, "stream resolved"
                    );
                    return Ok(data);
                }
                Mapped::Event(StreamEvent::Error { message }) => {
                    let message = if message.trim().is_empty() {
                        "the assistant reported an error".to_string()
                    } else {
                        message
                    };
                    return Err(Error::remote(None, message));
                }
                Mapped::Event(other @ StreamEvent::AutoInit { .. }) => {
                    warn!(
                        channel = label.as_str(),
                        event_type = other.type_name(),
                        "unexpected event on chat stream"
                    );
                }
                Mapped::End => {
                    return Err(TransportError::ChannelClosed(format!(
                        "{} finished without a result",
                        label
                    ))
                    .into())
                }
                Mapped::Ignored => {}
            }
        }
    }

    /// `POST {mode}/start`.
    pub async fn start_session(
        &self,
        mode: ConversationMode,
        resource_ref: Option<&str>,
        ctx: &OperationContext<SessionStarted>,
    ) -> Result<SessionStarted> {
        let body = serde_json::to_value(SessionStartRequest {
            resource_ref: resource_ref.map(str::to_string),
        })?;
        let endpoint = format!("{}/start", mode.as_str());
        let value = self.transport.post_json(&endpoint, &body).await?;
        let started: SessionStarted = serde_json::from_value(value)?;
        if started.session_id.trim().is_empty() {
            return Err(Error::remote(None, "backend returned an empty session id"));
        }
        ctx.capture(started.clone());
        Ok(started)
    }

    /// Out-of-band progress channel keyed by session id alone.
    pub async fn open_auto_init(
        &self,
        mode: ConversationMode,
        session_id: &str,
    ) -> Result<EventChannel> {
        let endpoint = format!("{}/progress", mode.as_str());
        self.transport
            .open_channel(
                &endpoint,
                &[("sessionId".to_string(), session_id.to_string())],
            )
            .await
    }
}
