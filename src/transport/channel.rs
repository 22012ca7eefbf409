//! Server-push channel with a close-exactly-once guarantee.

use crate::pipeline::decode::{SseDecoder, SseFrame};
use crate::{BoxStream, Result};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use tracing::debug;

type CloseHook = Box<dyn FnOnce() + Send>;

/// An open push channel.
///
/// The underlying byte stream is released by [`EventChannel::close`] or on drop,
/// whichever comes first; the close hook runs once either way.
pub struct EventChannel {
    label: String,
    frames: Option<BoxStream<'static, Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    ended: bool,
    on_close: Option<CloseHook>,
}

impl EventChannel {
    pub fn new(label: impl Into<String>, frames: BoxStream<'static, Bytes>) -> Self {
        Self {
            label: label.into(),
            frames: Some(frames),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            ended: false,
            on_close: None,
        }
    }

    /// Register a hook that runs when the channel is released.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_none()
    }

    /// Next decoded frame, or `None` once the sender finished or the channel was closed.
    pub async fn next_frame(&mut self) -> Option<Result<SseFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            if self.ended {
                return None;
            }
            let frames = self.frames.as_mut()?;
            match frames.next().await {
                Some(Ok(chunk)) => {
                    let decoded = self.decoder.feed(&chunk);
                    self.pending.extend(decoded);
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.ended = true;
                    if let Some(frame) = self.decoder.finish() {
                        self.pending.push_back(frame);
                    }
                }
            }
        }
    }

    /// Release the channel. Returns `true` only for the call that actually closed it.
    pub fn close(&mut self) -> bool {
        if self.frames.take().is_none() {
            return false;
        }
        self.pending.clear();
        debug!(channel = self.label.as_str(), "event channel closed");
        if let Some(hook) = self.on_close.take() {
            hook();
        }
        true
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .field("ended", &self.ended)
            .finish()
    }
}
