//! In-memory backend for tests and demos.
//!
//! Replies and channels are queued per endpoint and consumed in order. Every call is
//! recorded, and channel open/close counts are tracked so callers can assert that no
//! channel leaks.

use crate::transport::{EventChannel, Transport, TransportError};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// A scripted response to `post_json`.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Json(Value),
    /// Respond after a delay (measured on the tokio clock).
    Delayed(Duration, Value),
    /// Backend-reported failure.
    Remote { status: u16, message: String },
    /// Network failure.
    Unreachable(String),
    /// Never respond.
    Hang,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub body: Value,
    pub params: Vec<(String, String)>,
}

/// Sender side of a manually driven channel.
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelFeed {
    /// Push one event as an SSE `data:` frame. Returns `false` once the channel is gone.
    pub fn send(&self, event: Value) -> bool {
        self.send_raw(format!("data: {}\n\n", event))
    }

    /// Push raw bytes (partial frames, comments, garbage).
    pub fn send_raw(&self, raw: impl Into<String>) -> bool {
        self.tx.send(Bytes::from(raw.into())).is_ok()
    }

    /// True once the consumer released the channel.
    pub fn is_receiver_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<ScriptedReply>>,
    channels: HashMap<String, VecDeque<mpsc::UnboundedReceiver<Bytes>>>,
    calls: Vec<RecordedCall>,
}

/// Scripted [`Transport`].
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_reply(&self, endpoint: &str, reply: ScriptedReply) {
        self.script()
            .replies
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn script_reply(&self, endpoint: &str, body: Value) {
        self.push_reply(endpoint, ScriptedReply::Json(body));
    }

    /// Queue a channel that delivers `events` and then ends.
    pub fn script_channel(&self, endpoint: &str, events: Vec<Value>) {
        let feed = self.manual_channel(endpoint);
        for event in events {
            feed.send(event);
        }
    }

    /// Queue a channel whose frames are pushed by the caller. It ends when every
    /// clone of the returned feed is dropped.
    pub fn manual_channel(&self, endpoint: &str) -> ChannelFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script()
            .channels
            .entry(endpoint.to_string())
            .or_default()
            .push_back(rx);
        ChannelFeed { tx }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    pub fn opened_channels(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed_channels(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, endpoint: &str, body: Value, params: Vec<(String, String)>) {
        self.script().calls.push(RecordedCall {
            endpoint: endpoint.to_string(),
            body,
            params,
        });
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.record(endpoint, body.clone(), Vec::new());
        let reply = self
            .script()
            .replies
            .get_mut(endpoint)
            .and_then(|q| q.pop_front());

        match reply {
            Some(ScriptedReply::Json(v)) => Ok(v),
            Some(ScriptedReply::Delayed(after, v)) => {
                tokio::time::sleep(after).await;
                Ok(v)
            }
            Some(ScriptedReply::Remote { status, message }) => {
                Err(Error::remote(Some(status), message))
            }
            Some(ScriptedReply::Unreachable(reason)) => {
                Err(Error::Transport(TransportError::Other(reason)))
            }
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(Error::Transport(TransportError::Other(format!(
                "no scripted reply for {}",
                endpoint
            )))),
        }
    }

    async fn open_channel(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<EventChannel> {
        self.record(endpoint, Value::Null, params.to_vec());
        let rx = self
            .script()
            .channels
            .get_mut(endpoint)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| {
                Error::Transport(TransportError::Other(format!(
                    "no scripted channel for {}",
                    endpoint
                )))
            })?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        let closed = self.closed.clone();
        let frames = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<Bytes, Error>(chunk), rx))
        });
        Ok(EventChannel::new(endpoint, Box::pin(frames)).on_close(move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
