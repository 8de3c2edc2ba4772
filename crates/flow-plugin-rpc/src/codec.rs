//! Content-Length framing.
//!
//! Every message on the wire is `Content-Length: <N>\r\n\r\n` followed by
//! exactly `N` bytes of UTF-8 JSON, with no trailing delimiter. The
//! [`FrameDecoder`] accepts input in arbitrary chunks and yields a frame as
//! soon as its body is complete; the bytes of a partial frame stay buffered.

use serde_json::error::Category;
use tracing::trace;

use crate::error::Result;
use crate::message::Message;
use crate::warning::Warning;

/// Literal that opens every frame header.
pub const HEADER_PREFIX: &[u8] = b"Content-Length: ";

/// Separator between the header and the body.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Default upper bound for a single frame body (100 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 100 * 1024 * 1024;

/// Encode a message into a complete frame.
///
/// # Errors
///
/// Returns an error if the message cannot be serialized.
///
/// # Examples
///
/// ```
/// use flow_plugin_rpc::{Message, Request, encode};
/// use serde_json::Value;
///
/// let frame = encode(&Message::from(Request::notification("Ping", Value::Null))).unwrap();
/// assert!(frame.starts_with(b"Content-Length: 33\r\n\r\n"));
/// ```
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A well-formed message.
    Message(Message),
    /// A frame that was dropped, with the reason.
    Dropped(Warning),
}

impl Frame {
    /// Returns the message, discarding dropped frames.
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Message(message) => Some(message),
            Self::Dropped(_) => None,
        }
    }
}

/// Where the next header sits in the buffer.
#[derive(Debug, PartialEq, Eq)]
enum HeaderScan {
    /// A complete header starting at `start`.
    Found {
        start: usize,
        body_start: usize,
        length: usize,
    },
    /// A header candidate at `start` that needs more bytes to be judged.
    Incomplete { start: usize },
    /// No header candidate at all.
    Missing,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn scan_header(buf: &[u8]) -> HeaderScan {
    let mut from = 0;
    while let Some(offset) = find(&buf[from..], HEADER_PREFIX) {
        let start = from + offset;
        let digits_start = start + HEADER_PREFIX.len();
        let digits_len = buf[digits_start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let digits_end = digits_start + digits_len;
        let rest = &buf[digits_end..];

        if digits_len > 0 && rest.starts_with(HEADER_TERMINATOR) {
            // Lengths too large for usize can never fit under the frame limit.
            let length = std::str::from_utf8(&buf[digits_start..digits_end])
                .ok()
                .and_then(|digits| digits.parse().ok())
                .unwrap_or(usize::MAX);
            return HeaderScan::Found {
                start,
                body_start: digits_end + HEADER_TERMINATOR.len(),
                length,
            };
        }

        let could_complete = rest.len() < HEADER_TERMINATOR.len()
            && HEADER_TERMINATOR.starts_with(rest)
            && (digits_len > 0 || rest.is_empty());
        if could_complete {
            return HeaderScan::Incomplete { start };
        }

        from = start + 1;
    }
    HeaderScan::Missing
}

/// Incremental decoder for framed messages.
///
/// Bytes that precede a header are discarded. A body that fails to parse is
/// reported as [`Frame::Dropped`] and never affects the frames after it.
///
/// # Examples
///
/// ```
/// use flow_plugin_rpc::{FrameDecoder, Message, Request, encode};
/// use serde_json::json;
///
/// let frame = encode(&Message::from(Request::new(1_i64, "query", json!([])))).unwrap();
/// let (head, tail) = frame.split_at(10);
///
/// let mut decoder = FrameDecoder::new();
/// assert!(decoder.decode(head).is_empty());
/// assert_eq!(decoder.decode(tail).len(), 1);
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes received but not yet consumed.
    buffer: Vec<u8>,
    /// Largest accepted body length.
    max_frame_bytes: usize,
    /// Body bytes of an oversized frame still to be thrown away.
    skip_remaining: usize,
    /// Number of headers accepted so far.
    frames_seen: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the [`DEFAULT_MAX_FRAME_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Creates a decoder with a custom body size limit.
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
            skip_remaining: 0,
            frames_seen: 0,
        }
    }

    /// Number of bytes currently retained.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of frames (kept or dropped) decoded so far.
    #[must_use]
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    /// Appends raw bytes to the internal buffer.
    pub fn extend(&mut self, mut chunk: &[u8]) {
        if self.skip_remaining > 0 {
            let skipped = self.skip_remaining.min(chunk.len());
            self.skip_remaining -= skipped;
            chunk = &chunk[skipped..];
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Appends `chunk` and returns every frame that became complete.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.extend(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Returns the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        match scan_header(&self.buffer) {
            HeaderScan::Missing => {
                // Keep only a tail that could still grow into a header prefix.
                let keep = self.buffer.len().min(HEADER_PREFIX.len() - 1);
                let discard = self.buffer.len() - keep;
                self.buffer.drain(..discard);
                None
            }
            HeaderScan::Incomplete { start } => {
                self.buffer.drain(..start);
                None
            }
            HeaderScan::Found {
                start,
                body_start,
                length,
            } => {
                if length > self.max_frame_bytes {
                    return Some(self.skip_oversized(body_start, length));
                }

                let end = body_start + length;
                if self.buffer.len() < end {
                    self.buffer.drain(..start);
                    return None;
                }

                let frame: Vec<u8> = self.buffer.drain(..end).collect();
                self.frames_seen += 1;
                trace!(frame = self.frames_seen, length, "Decoded frame");
                Some(parse_body(&frame[body_start..], self.frames_seen))
            }
        }
    }

    fn skip_oversized(&mut self, body_start: usize, length: usize) -> Frame {
        self.frames_seen += 1;
        let available = self.buffer.len() - body_start;
        if available >= length {
            self.buffer.drain(..body_start + length);
        } else {
            self.skip_remaining = length - available;
            self.buffer.clear();
        }
        Frame::Dropped(Warning::OversizedFrame {
            frame_number: self.frames_seen,
            length,
            limit: self.max_frame_bytes,
        })
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_body(body: &[u8], frame_number: usize) -> Frame {
    match serde_json::from_slice::<Message>(body) {
        Ok(message) => Frame::Message(message),
        Err(e) if e.classify() == Category::Data => Frame::Dropped(Warning::InvalidMessage {
            frame_number,
            reason: e.to_string(),
        }),
        Err(e) => Frame::Dropped(Warning::MalformedJson {
            frame_number,
            error: e.to_string(),
        }),
    }
}
