//! Content-Length framed JSON-RPC 2.0 for launcher plugins.
//!
//! This library provides the wire layer between a plugin process and its
//! host: the [`Message`] model, an incremental [`FrameDecoder`] that tolerates
//! arbitrary chunking, and async [`FrameReader`]/[`FrameWriter`] adapters.
//!
//! Each frame is a `Content-Length: <N>\r\n\r\n` header followed by exactly
//! `N` bytes of UTF-8 JSON. Frames whose body cannot be understood are
//! dropped and reported as [`Warning`]s; they never poison the stream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod warning;
pub mod writer;

pub use codec::{DEFAULT_MAX_FRAME_BYTES, Frame, FrameDecoder, encode};
pub use error::{Error, Result};
pub use message::{ErrorObject, INTERNAL_ERROR, Message, Request, RequestId, Response, ResponsePayload};
pub use reader::{FrameReader, RETAINED_WARNINGS};
pub use warning::{Warning, WarningCollector};
pub use writer::FrameWriter;
