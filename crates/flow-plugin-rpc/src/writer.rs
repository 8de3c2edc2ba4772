//! Async writing of framed messages.

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::trace;

use crate::codec::encode;
use crate::error::Result;
use crate::message::Message;

/// Async writer for Content-Length framed messages.
///
/// `FrameWriter` wraps an async writer in a [`BufWriter`]. [`send`](Self::send)
/// writes and flushes one message, which is what an interactive peer needs;
/// [`write`](Self::write) only buffers.
///
/// # Examples
///
/// ```
/// use flow_plugin_rpc::{FrameWriter, Message, Request};
/// use serde_json::Value;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut writer = FrameWriter::new(Vec::new());
/// writer.send(&Message::from(Request::notification("Ping", Value::Null))).await?;
/// let bytes = writer.into_inner().into_inner();
/// assert!(bytes.starts_with(b"Content-Length: "));
/// # Ok(())
/// # }
/// ```
pub struct FrameWriter<W> {
    /// Buffered writer wrapping the underlying async writer.
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a new `FrameWriter` wrapping the given async writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Buffers one framed message.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub async fn write(&mut self, message: &Message) -> Result<()> {
        let frame = encode(message)?;
        trace!(bytes = frame.len(), "Writing frame");
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    /// Flushes buffered frames to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Writes one framed message and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing or flushing fails.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.write(message).await?;
        self.flush().await
    }

    /// Consumes the writer, returning the underlying buffered writer.
    ///
    /// Note: This does not flush the buffer. Call [`flush`](Self::flush)
    /// first to ensure all data is written.
    #[must_use]
    pub fn into_inner(self) -> BufWriter<W> {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, RequestId, Response};
    use crate::reader::FrameReader;
    use serde_json::json;
    use std::io::Cursor;

    #[tokio::test]
    async fn write_does_not_flush_until_asked() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer
            .write(&Message::from(Request::notification("Ping", json!([]))))
            .await
            .unwrap();
        assert!(writer.into_inner().get_ref().get_ref().is_empty());
    }

    #[tokio::test]
    async fn sent_messages_read_back_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let first = Message::from(Request::new(0_i64, "ShowMsg", json!(["hi"])));
        let second = Message::from(Response::internal_error(RequestId::Number(4), "boom"));
        writer.send(&first).await.unwrap();
        writer.send(&second).await.unwrap();

        let bytes = writer.into_inner().into_inner().into_inner();
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_message().await.unwrap(), Some(first));
        assert_eq!(reader.read_message().await.unwrap(), Some(second));
        assert_eq!(reader.read_message().await.unwrap(), None);
    }
}
