//! Server-Sent Events decoding for streamable HTTP responses.
//!
//! Only `event:` and `data:` fields are interpreted. Each blank-line-delimited
//! block becomes one [`SseEvent`]; consecutive `data:` lines of a block are
//! joined with `\n`. Comments (`:`) and other fields are skipped.

use crate::mcp::error::TransportError;
use serde_json::Value;

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, when the block carried an `event:` field
    pub event: Option<String>,

    /// Joined `data:` payload
    pub data: String,
}

/// Decode a complete SSE body into its events
///
/// Blocks without any `data:` line produce no event.
pub fn decode_sse_events(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event: event.take(),
                    data: data_lines.join("\n"),
                });
                data_lines.clear();
            }
            event = None;
            continue;
        }

        if line.starts_with(':') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        }
    }

    if !data_lines.is_empty() {
        events.push(SseEvent {
            event,
            data: data_lines.join("\n"),
        });
    }

    events
}

/// Parse the payload of the first event as JSON
///
/// The HTTP transport expects one reply per POST, so later events are ignored.
pub fn parse_first_json_event(body: &str) -> Result<Value, TransportError> {
    let events = decode_sse_events(body);
    let first = events.first().ok_or(TransportError::MissingEventData)?;
    serde_json::from_str(&first.data).map_err(TransportError::InvalidJson)
}
