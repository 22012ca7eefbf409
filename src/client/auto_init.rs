//! Follower for the out-of-band auto-init channel.

use crate::client::core::AgentSessions;
use crate::notify::Notification;
use crate::pipeline::event_map::{map_frame, Mapped};
use crate::resilience::{with_deadline, OperationContext};
use crate::transport::EventChannel;
use crate::types::events::StreamEvent;
use crate::types::mode::ConversationMode;
use crate::Result;
use tokio::runtime::Handle;
use tracing::{debug, warn};

impl AgentSessions {
    /// Append `auto_init` messages pushed for `session_id` until the channel ends,
    /// the session is no longer bound to `mode`, or the stream deadline passes.
    /// Invalidating the session (mode switch, resource change) closes the channel.
    ///
    /// Returns the number of messages appended.
    pub async fn follow_auto_init(&self, mode: ConversationMode, session_id: &str) -> Result<usize> {
        let scope = self.with_registry(|r| {
            let binding = r.conversation_mut(mode).binding();
            (binding.session_id() == Some(session_id)).then(|| binding.scope())
        });
        let Some(scope) = scope else {
            debug!(mode = %mode, session_id, "session no longer bound, skipping auto-init");
            return Ok(0);
        };
        let adapter = self.inner.adapter.clone();
        let deadline = self.inner.config.stream_deadline();

        with_deadline("auto-init", deadline, &scope, |ctx| async move {
            let mut channel = adapter.open_auto_init(mode, session_id).await?;
            let outcome = self.drain_auto_init(mode, session_id, &mut channel, &ctx).await;
            channel.close();
            outcome
        })
        .await
    }

    async fn drain_auto_init(
        &self,
        mode: ConversationMode,
        session_id: &str,
        channel: &mut EventChannel,
        ctx: &OperationContext<usize>,
    ) -> Result<usize> {
        let mut appended = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => {
                    debug!(mode = %mode, session_id, "session ended, leaving auto-init channel");
                    return Ok(appended);
                }
                frame = channel.next_frame() => frame,
            };
            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(e),
                None => break,
            };

            let message = match map_frame(frame, channel.label()) {
                Mapped::Event(StreamEvent::AutoInit { message }) => message,
                Mapped::End => break,
                Mapped::Event(other) => {
                    debug!(mode = %mode, event_type = other.type_name(), "ignoring event on auto-init channel");
                    continue;
                }
                Mapped::Ignored => continue,
            };
            if message.trim().is_empty() {
                continue;
            }

            let added = self.with_registry(|r| {
                let conv = r.conversation_mut(mode);
                if conv.binding().session_id() != Some(session_id) {
                    return None;
                }
                Some(conv.append_assistant(message))
            });
            match added {
                Some(message) => {
                    appended += 1;
                    ctx.capture(appended);
                    self.notify(Notification::MessageAppended { mode, message });
                }
                None => {
                    debug!(mode = %mode, session_id, "session changed, leaving auto-init channel");
                    break;
                }
            }
        }
        Ok(appended)
    }

    pub(crate) fn spawn_auto_init(&self, mode: ConversationMode, session_id: String) {
        let Ok(handle) = Handle::try_current() else {
            warn!(mode = %mode, "no runtime, not following auto-init");
            return;
        };
        let this = self.clone();
        handle.spawn(async move {
            match this.follow_auto_init(mode, &session_id).await {
                Ok(count) => debug!(mode = %mode, count, "auto-init channel finished"),
                Err(e) => warn!(mode = %mode, error = %e, "auto-init channel failed"),
            }
        });
    }
}
