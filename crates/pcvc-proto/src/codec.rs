//! Newline-delimited JSON framing.
//!
//! Every message in both directions is one compact JSON document followed by
//! a single `\n`. A message without its terminator is a protocol violation,
//! not a short read: the decoder fails once the frame outgrows `max_length`
//! or the stream ends mid-frame.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::error::{FramingError, ProtocolError, ProtocolResult};

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Codec turning a byte stream into JSON documents and back.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_length: usize,
    /// Bytes already scanned for a terminator
    next_index: usize,
}

impl JsonLineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Codec rejecting payloads longer than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length, next_index: 0 }
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonLineCodec {
    type Item = Value;
    type Error = ProtocolError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Value>, ProtocolError> {
        let read_to = buf.len().min(self.max_length.saturating_add(1));
        let newline = buf[self.next_index..read_to].iter().position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let frame = buf.split_to(end + 1);
                let value = serde_json::from_slice(&frame[..end])?;
                Ok(Some(value))
            }
            None if buf.len() > self.max_length => {
                Err(FramingError::TooLong { max: self.max_length }.into())
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Value>, ProtocolError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(FramingError::Unterminated { pending: buf.len() }.into()),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonLineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let json = serde_json::to_vec(&item).map_err(ProtocolError::Encode)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Read the next frame, waiting at most `limit` for it to arrive.
///
/// `Ok(None)` means the peer closed the stream between frames.
pub(crate) async fn next_frame<S>(
    framed: &mut Framed<S, JsonLineCodec>,
    limit: Option<Duration>,
) -> ProtocolResult<Option<Value>>
where
    S: AsyncRead + Unpin,
{
    let next = match limit {
        Some(limit) => timeout(limit, framed.next()).await.map_err(|_| ProtocolError::Timeout)?,
        None => framed.next().await,
    };
    next.transpose()
}
