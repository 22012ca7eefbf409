//! Event mapping (JSON frame -> StreamEvent)
//!
//! Unknown `type` values and payloads that do not match their variant are logged
//! and skipped; they never terminate the channel.

use crate::pipeline::decode::SseFrame;
use crate::types::events::StreamEvent;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of mapping one decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    Event(StreamEvent),
    /// The sender signalled the end of the stream.
    End,
    Ignored,
}

pub fn map_frame(frame: SseFrame, channel: &str) -> Mapped {
    match frame {
        SseFrame::Json(value) => map_value(value, channel),
        SseFrame::Done => Mapped::End,
        SseFrame::Malformed(raw) => {
            warn!(
                channel,
                payload = truncate(&raw, 200),
                "ignoring malformed stream frame"
            );
            Mapped::Ignored
        }
    }
}

pub fn map_value(value: Value, channel: &str) -> Mapped {
    let type_name = value
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_string);

    match serde_json::from_value::<StreamEvent>(value) {
        Ok(event) => {
            debug!(channel, event_type = event.type_name(), "stream event");
            Mapped::Event(event)
        }
        Err(e) => {
            warn!(
                channel,
                event_type = type_name.as_deref().unwrap_or("<missing>"),
                error = %e,
                "ignoring unrecognized stream event"
            );
            Mapped::Ignored
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
