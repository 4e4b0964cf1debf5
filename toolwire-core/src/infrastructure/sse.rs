//! Incremental Server-Sent-Events decoder
//!
//! Bytes arrive in arbitrary chunks. Complete lines are decoded as soon as
//! their newline is seen; the unterminated tail is carried over to the next
//! read. Only `data: ` lines are frames. `[DONE]` ends the stream. A payload
//! that fails to parse is dropped and counted, never fatal.

use crate::constants::{DATA_PREFIX, DONE_SENTINEL};
use crate::domain::catalog::ChunkTransform;
use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// One decoded unit of an event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Progress { value: f64, status: Option<String> },
    Status(String),
    Delta(String),
    Error(String),
    /// Structured payload with no recognised shape.
    Payload(Value),
}

impl StreamFrame {
    /// Classifies a parsed payload by the keys it carries.
    pub fn classify(payload: Value) -> Self {
        let text_field = |value: &Value, key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match &payload {
            Value::String(text) => return StreamFrame::Delta(text.clone()),
            Value::Object(_) => {}
            _ => return StreamFrame::Payload(payload),
        }

        if let Some(error) = text_field(&payload, "error") {
            return StreamFrame::Error(error);
        }
        if let Some(value) = payload.get("progress").and_then(Value::as_f64) {
            return StreamFrame::Progress {
                value,
                status: text_field(&payload, "status"),
            };
        }
        for key in ["content", "delta", "text", "response"] {
            if let Some(text) = text_field(&payload, key) {
                return StreamFrame::Delta(text);
            }
        }
        if let Some(status) = text_field(&payload, "status") {
            return StreamFrame::Status(status);
        }
        StreamFrame::Payload(payload)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame payload '{payload}': {source}")]
    Malformed {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
    /// The frame parsed but carries no visible delta.
    #[error("frame carried no visible delta")]
    Rejected,
}

/// Result of decoding one complete line.
#[derive(Debug)]
pub enum LineEvent {
    Frame(Result<StreamFrame, FrameError>),
    Done,
}

/// Counters for one consumed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// The terminal sentinel was seen before end-of-stream.
    pub completed: bool,
    pub delivered: u64,
    /// Payloads that failed to parse.
    pub dropped: u64,
    /// Payloads without a visible delta, filtered by the chunk transform
    /// or empty.
    pub skipped: u64,
}

pub struct SseDecoder {
    buffer: Vec<u8>,
    chunk_transform: Option<ChunkTransform>,
}

impl SseDecoder {
    pub fn new(chunk_transform: Option<ChunkTransform>) -> Self {
        Self {
            buffer: Vec::new(),
            chunk_transform,
        }
    }

    /// Appends a read and returns the events of every line it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LineEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<LineEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&String::from_utf8_lossy(&rest))
    }

    pub fn decode_line(&self, line: &str) -> Option<LineEvent> {
        let line = line.trim_end_matches('\r');
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        if payload == DONE_SENTINEL {
            return Some(LineEvent::Done);
        }
        Some(LineEvent::Frame(self.decode_payload(payload)))
    }

    fn decode_payload(&self, payload: &str) -> Result<StreamFrame, FrameError> {
        let value = parse_lenient(payload)?;
        match &self.chunk_transform {
            Some(transform) => match transform(&value) {
                Some(delta) if !delta.is_empty() => Ok(StreamFrame::Delta(delta)),
                _ => Err(FrameError::Rejected),
            },
            None => match StreamFrame::classify(value) {
                StreamFrame::Delta(delta) if delta.is_empty() => Err(FrameError::Rejected),
                frame => Ok(frame),
            },
        }
    }
}

/// Parses a JSON payload, retrying with single quotes normalised to double
/// quotes for servers that emit Python-style dicts.
pub fn parse_lenient(payload: &str) -> Result<Value, FrameError> {
    serde_json::from_str(payload).or_else(|source| {
        if !payload.contains('\'') {
            return Err(FrameError::Malformed {
                payload: payload.to_string(),
                source,
            });
        }
        serde_json::from_str(&payload.replace('\'', "\"")).map_err(|_| FrameError::Malformed {
            payload: payload.to_string(),
            source,
        })
    })
}

/// Drains `stream`, forwarding every decoded frame to `on_frame`.
///
/// Returns when the sentinel is seen or when the stream ends. Read errors
/// from the underlying stream are the only failure.
pub async fn consume<S, B, E>(
    stream: S,
    chunk_transform: Option<ChunkTransform>,
    on_frame: &mut (dyn FnMut(StreamFrame) + Send),
) -> Result<StreamOutcome, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = SseDecoder::new(chunk_transform);
    let mut outcome = StreamOutcome::default();

    while let Some(read) = stream.next().await {
        let bytes = read?;
        for event in decoder.feed(bytes.as_ref()) {
            if apply(event, &mut outcome, on_frame) {
                debug!(delivered = outcome.delivered, "Stream reached terminal sentinel");
                return Ok(outcome);
            }
        }
    }

    if let Some(event) = decoder.finish() {
        if apply(event, &mut outcome, on_frame) {
            return Ok(outcome);
        }
    }
    debug!(
        delivered = outcome.delivered,
        dropped = outcome.dropped,
        "Stream ended without terminal sentinel"
    );
    Ok(outcome)
}

/// Returns `true` once the sentinel has been applied.
fn apply(
    event: LineEvent,
    outcome: &mut StreamOutcome,
    on_frame: &mut (dyn FnMut(StreamFrame) + Send),
) -> bool {
    match event {
        LineEvent::Done => {
            outcome.completed = true;
            true
        }
        LineEvent::Frame(Ok(frame)) => {
            outcome.delivered += 1;
            on_frame(frame);
            false
        }
        LineEvent::Frame(Err(FrameError::Rejected)) => {
            outcome.skipped += 1;
            false
        }
        LineEvent::Frame(Err(err)) => {
            warn!(error = %err, "Dropping malformed stream frame");
            outcome.dropped += 1;
            false
        }
    }
}
