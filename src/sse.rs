//! Server-Sent Events (SSE) processing for streaming chat completions.
//!
//! OpenAI-compatible servers answer a streaming `chat/completions` request
//! with a sequence of `data:` events, each carrying one JSON chunk, and
//! terminate the sequence with `data: [DONE]`.  This module turns the raw
//! byte stream into a stream of [`ChatCompletionChunk`]s.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::observability::{STREAM_CHUNKS, STREAM_ERRORS, STREAM_MALFORMED_CHUNKS};
use crate::types::{ChunkChoice, ChunkDelta};
use crate::{ChatCompletionChunk, Error, Result};

/// Payload of the sentinel event that ends a stream.
const DONE_SENTINEL: &str = "[DONE]";

/// What a single SSE event turned out to contain.
#[derive(Debug)]
enum SseData {
    /// A chunk, or the error the server reported in place of one.
    Chunk(Result<ChatCompletionChunk>),
    /// The `[DONE]` sentinel.
    Done,
}

/// Process a stream of bytes into a stream of completion chunks.
///
/// Events are buffered as bytes so that a multi-byte character split across
/// two network reads is decoded correctly.  The returned stream ends on
/// `[DONE]`, at the end of the body, or right after yielding a transport
/// error.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(
        (stream, EventBuffer::default(), false),
        move |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // First check if we have a complete event in the buffer
                if let Some(event) = buffer.next_event() {
                    match parse_event(&event) {
                        Some(SseData::Chunk(chunk)) => {
                            let finished = chunk.is_err();
                            if finished {
                                STREAM_ERRORS.click();
                            }
                            return Some((chunk, (stream, buffer, finished)));
                        }
                        Some(SseData::Done) => return None,
                        None => continue,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.push(&bytes),
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer, true)));
                    }
                    None => {
                        // A final event may arrive without its blank-line terminator.
                        let event = buffer.take_rest();
                        return match parse_event(&event) {
                            Some(SseData::Chunk(chunk)) => {
                                if chunk.is_err() {
                                    STREAM_ERRORS.click();
                                }
                                Some((chunk, (stream, buffer, true)))
                            }
                            Some(SseData::Done) | None => None,
                        };
                    }
                }
            }
        },
    )
}

/// Raw bytes received but not yet split into events.
///
/// Events are delimited by a blank line, written as either `\n\n` or
/// `\r\n\r\n`.  `scanned` remembers how far the search for a delimiter got,
/// so each byte is examined a bounded number of times however the event is
/// split across reads.
#[derive(Debug, Default)]
struct EventBuffer {
    bytes: Vec<u8>,
    scanned: usize,
}

impl EventBuffer {
    /// Longest delimiter minus one: a delimiter may straddle two reads.
    const OVERLAP: usize = 3;

    fn push(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Remove and return the first complete event.
    fn next_event(&mut self) -> Option<Vec<u8>> {
        let start = self.scanned.saturating_sub(Self::OVERLAP);
        let found = (start..self.bytes.len()).find_map(|idx| {
            let rest = &self.bytes[idx..];
            if rest.starts_with(b"\r\n\r\n") {
                Some((idx, 4))
            } else if rest.starts_with(b"\n\n") {
                Some((idx, 2))
            } else {
                None
            }
        });
        let Some((end, delimiter)) = found else {
            self.scanned = self.bytes.len();
            return None;
        };
        let rest = self.bytes.split_off(end + delimiter);
        let mut event = std::mem::replace(&mut self.bytes, rest);
        event.truncate(end);
        self.scanned = 0;
        Some(event)
    }

    /// Take whatever is left, terminated or not.
    fn take_rest(&mut self) -> Vec<u8> {
        self.scanned = 0;
        std::mem::take(&mut self.bytes)
    }
}

/// Parse the `data:` lines of one event.
///
/// Returns `None` for events that carry no data, such as keep-alive
/// comments.
fn parse_event(event: &[u8]) -> Option<SseData> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => {
            return Some(SseData::Chunk(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            ))));
        }
    };

    let mut data_lines = Vec::new();
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.strip_prefix(' ').unwrap_or(data));
        }
        // `event:`, `id:` and `retry:` fields carry nothing we use.
    }
    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    if data.trim() == DONE_SENTINEL {
        return Some(SseData::Done);
    }
    Some(SseData::Chunk(parse_chunk(&data)))
}

/// Parse the JSON payload of a data event.
///
/// Payloads that are not JSON are counted and returned as an empty chunk.
/// Payloads whose shape does not match a chunk are counted too, but still
/// yield whatever text sits at `choices[0].delta.content`.  An `error`
/// object is the server's way of aborting a stream and becomes an error.
fn parse_chunk(data: &str) -> Result<ChatCompletionChunk> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) => {
            STREAM_MALFORMED_CHUNKS.click();
            return Ok(ChatCompletionChunk::default());
        }
    };

    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        return Err(stream_error(error));
    }

    STREAM_CHUNKS.click();
    match ChatCompletionChunk::deserialize(&value) {
        Ok(chunk) => Ok(chunk),
        Err(_) => {
            STREAM_MALFORMED_CHUNKS.click();
            Ok(lenient_chunk(&value))
        }
    }
}

/// Pick out the fields of a chunk one by one, skipping any of the wrong type.
fn lenient_chunk(value: &Value) -> ChatCompletionChunk {
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);
    let choices = value
        .pointer("/choices/0")
        .map(|choice| ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: text(choice.pointer("/delta/role")),
                content: text(choice.pointer("/delta/content")),
            },
            finish_reason: text(choice.get("finish_reason")),
        })
        .into_iter()
        .collect();
    ChatCompletionChunk {
        id: text(value.get("id")),
        model: text(value.get("model")),
        created: value.get("created").and_then(Value::as_u64),
        choices,
    }
}

/// Convert an in-stream `error` object into an [`Error`].
fn stream_error(error: &Value) -> Error {
    let message = match error {
        Value::String(message) => message.clone(),
        _ => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    };
    let error_type = error
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("stream_error")
        .to_string();
    let status_code = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(500);
    Error::api(status_code, Some(error_type), message, None)
}
