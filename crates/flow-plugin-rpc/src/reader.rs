//! Async reading of framed messages.
//!
//! [`FrameReader`] pulls bytes from any [`AsyncRead`] source, feeds them to a
//! [`FrameDecoder`] and hands out complete messages. Dropped frames are
//! logged and recorded in a [`WarningCollector`] instead of surfacing as
//! errors; only I/O failures end the stream early.

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::codec::{DEFAULT_MAX_FRAME_BYTES, Frame, FrameDecoder};
use crate::error::Result;
use crate::message::Message;
use crate::warning::WarningCollector;

/// Size of each read from the underlying source.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Number of recent dropped-frame warnings a reader keeps. Older ones are
/// only counted; every drop is still logged.
pub const RETAINED_WARNINGS: usize = 64;

/// Async reader for Content-Length framed messages.
///
/// # Type Parameters
///
/// * `R` - The underlying async reader type. Must implement [`AsyncRead`] and [`Unpin`].
///
/// # Examples
///
/// ```
/// use flow_plugin_rpc::FrameReader;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: &[u8] = b"Content-Length: 33\r\n\r\n{\"jsonrpc\":\"2.0\",\"method\":\"Ping\"}";
/// let mut reader = FrameReader::new(bytes);
/// let message = reader.read_message().await?.expect("one message");
/// assert_eq!(message.method(), Some("Ping"));
/// assert!(reader.read_message().await?.is_none());
/// # Ok(())
/// # }
/// ```
pub struct FrameReader<R> {
    /// Underlying byte source.
    reader: R,
    /// Incremental frame decoder.
    decoder: FrameDecoder,
    /// Reusable read buffer.
    chunk: Vec<u8>,
    /// Frames dropped so far.
    warnings: WarningCollector,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a new `FrameReader` with the default frame size limit.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_bytes(reader, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Creates a new `FrameReader` that drops bodies larger than `max_frame_bytes`.
    #[must_use]
    pub fn with_max_frame_bytes(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::with_max_frame_bytes(max_frame_bytes),
            chunk: vec![0; READ_CHUNK_BYTES],
            warnings: WarningCollector::bounded(RETAINED_WARNINGS),
        }
    }

    /// Returns a handle to the warnings recorded for dropped frames. At most
    /// [`RETAINED_WARNINGS`] are kept; [`WarningCollector::total`] counts all.
    #[must_use]
    pub fn warnings(&self) -> &WarningCollector {
        &self.warnings
    }

    /// Reads the next complete message.
    ///
    /// Returns `Ok(None)` at end of input. Bytes of an unfinished frame at
    /// end of input are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading from the underlying source fails.
    pub async fn read_message(&mut self) -> Result<Option<Message>> {
        loop {
            while let Some(frame) = self.decoder.next_frame() {
                match frame {
                    Frame::Message(message) => return Ok(Some(message)),
                    Frame::Dropped(warning) => {
                        warn!(kind = warning.kind(), "Dropping frame: {warning}");
                        self.warnings.add(warning);
                    }
                }
            }

            let read = self.reader.read(&mut self.chunk).await?;
            if read == 0 {
                if self.decoder.buffered_len() > 0 {
                    debug!(
                        buffered = self.decoder.buffered_len(),
                        "End of input inside an unfinished frame"
                    );
                }
                return Ok(None);
            }
            self.decoder.extend(&self.chunk[..read]);
        }
    }

    /// Converts the reader into a stream of messages.
    ///
    /// The stream ends at end of input or right after yielding an I/O error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Message>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.read_message().await {
                Ok(Some(message)) => Some((Ok(message), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Consumes the reader, returning the underlying source.
    ///
    /// Any buffered but undecoded bytes are lost.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.reader
    }
}
