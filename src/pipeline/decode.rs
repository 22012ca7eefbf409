//! Streaming decoders (Bytes -> JSON Value)
//!
//! Decodes Server-Sent Events framing incrementally: bytes arrive in arbitrary
//! chunks, frames are emitted once their terminating blank line is seen.

use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

/// A decoded SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// `data:` payload parsed as JSON.
    Json(Value),
    /// `data:` payload that is not valid JSON (kept for logging).
    Malformed(String),
    /// Terminal `[DONE]` sentinel.
    Done,
}

/// A minimal, incremental SSE decoder:
/// - splits by blank line (CRLF normalized)
/// - joins multi-line `data:` fields
/// - ignores comments, `event:`, `id:` and `retry:` fields
/// - recognizes the `[DONE]` sentinel
pub struct SseDecoder {
    buf: Vec<u8>,
    done_signal: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            done_signal: "[DONE]".to_string(),
        }
    }

    pub fn with_done_signal(mut self, signal: impl Into<String>) -> Self {
        self.done_signal = signal.into();
        self
    }

    /// Feed a chunk and return every frame it completes.
    ///
    /// Bytes are buffered raw so a UTF-8 sequence split across chunks is decoded intact.
    pub fn feed(&mut self, chunk: &Bytes) -> Vec<SseFrame> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(idx) = find_blank_line(&self.buf) {
            let raw: Vec<u8> = self.buf.drain(..idx + 2).collect();
            if let Some(frame) = self.parse_frame(&raw[..idx]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the channel ends.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buf);
        self.parse_frame(&raw)
    }

    fn parse_frame(&self, raw: &[u8]) -> Option<SseFrame> {
        let text = String::from_utf8_lossy(raw);
        let mut data: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("data:") {
                data.push(rest.strip_prefix(' ').unwrap_or(rest));
            } else if line.starts_with("event:")
                || line.starts_with("id:")
                || line.starts_with("retry:")
            {
                continue;
            } else {
                // Bare JSON lines without a field name are accepted as data.
                data.push(line);
            }
        }

        if data.is_empty() {
            return None;
        }
        let payload = data.join("\n");
        let payload = payload.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == self.done_signal {
            return Some(SseFrame::Done);
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(v) => Some(SseFrame::Json(v)),
            Err(e) => {
                warn!(error = %e, "sse frame is not valid json");
                Some(SseFrame::Malformed(payload.to_string()))
            }
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_frames_across_chunk_boundaries() {
        let mut dec = SseDecoder::new();
        let mut frames = dec.feed(&Bytes::from_static(b"data: {\"type\":\"pro"));
        assert!(frames.is_empty());
        frames.extend(dec.feed(&Bytes::from_static(
            b"gress\",\"message\":\"Connecting\"}\n\ndata: [DONE]\n\n",
        )));

        assert_eq!(
            frames,
            vec![
                SseFrame::Json(json!({"type": "progress", "message": "Connecting"})),
                SseFrame::Done,
            ]
        );
    }

    #[test]
    fn handles_crlf_comments_and_event_fields() {
        let mut dec = SseDecoder::new();
        let frames = dec.feed(&Bytes::from_static(
            b": keepalive\r\n\r\nevent: message\r\nid: 7\r\ndata: {\"type\":\"error\",\"message\":\"boom\"}\r\n\r\n",
        ));
        assert_eq!(
            frames,
            vec![SseFrame::Json(json!({"type": "error", "message": "boom"}))]
        );
    }

    #[test]
    fn keeps_multibyte_text_split_between_chunks() {
        let text = "data: {\"type\":\"progress\",\"message\":\"Verbinde … ok\"}\n\n";
        let bytes = text.as_bytes();
        // Split inside the three-byte ellipsis.
        let split = text.find('…').unwrap() + 1;

        let mut dec = SseDecoder::new();
        assert!(dec.feed(&Bytes::copy_from_slice(&bytes[..split])).is_empty());
        let frames = dec.feed(&Bytes::copy_from_slice(&bytes[split..]));
        assert_eq!(
            frames,
            vec![SseFrame::Json(
                json!({"type": "progress", "message": "Verbinde … ok"})
            )]
        );
    }

    #[test]
    fn reports_malformed_payload_and_flushes_tail() {
        let mut dec = SseDecoder::new();
        let frames = dec.feed(&Bytes::from_static(b"data: {not json}\n\ndata: {\"a\":1}"));
        assert_eq!(frames, vec![SseFrame::Malformed("{not json}".to_string())]);
        assert_eq!(dec.finish(), Some(SseFrame::Json(json!({"a": 1}))));
        assert_eq!(dec.finish(), None);
    }
}
