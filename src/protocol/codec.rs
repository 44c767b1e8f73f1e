//! # Frame Codec
//!
//! Length-delimited framing over the TCP byte stream.
//!
//! ## Wire Format
//! ```text
//! [Length(4, u32 big-endian)] [UTF-8 JSON message(Length)]
//! ```
//!
//! ## Security
//! - Length is validated against `max_frame_len` before any allocation;
//!   oversized frames are protocol violations, never silent truncation
//! - A short buffer is never partially consumed: the caller sees `None` and
//!   reads more bytes
//!
//! ## Malformed frames
//! The decoder yields [`FrameEvent`] rather than bare messages so the
//! connection handler can account for violations. In lenient mode (default)
//! a frame that fails to parse is consumed and reported as
//! `FrameEvent::Malformed`, keeping the stream live; an oversized frame is
//! reported once and its body discarded as it arrives. Strict mode turns
//! both into decode errors that tear the connection down.

use crate::config::{LENGTH_HEADER_SIZE, TransportConfig, MAX_FRAME_SIZE};
use crate::error::{BrokerError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// One decoded unit from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// A complete, well-formed message.
    Message(Message),
    /// A complete frame whose body failed to parse; the frame was consumed.
    Malformed { len: usize },
    /// A frame declaring more than `max_frame_len` bytes; the body is
    /// discarded as it arrives.
    Oversized { declared: usize },
}

/// Tokio codec for length-prefixed JSON message frames.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_len: usize,
    strict: bool,
    /// Bytes of an oversized frame body still to be discarded.
    skip_remaining: usize,
}

impl FrameCodec {
    /// Create a codec with an explicit frame cap and strictness.
    pub fn new(max_frame_len: usize, strict: bool) -> Self {
        Self {
            max_frame_len,
            strict,
            skip_remaining: 0,
        }
    }

    /// Create a codec from transport configuration.
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.max_frame_size, config.strict_decode)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE, false)
    }
}

impl Decoder for FrameCodec {
    type Item = FrameEvent;
    type Error = BrokerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>> {
        // Finish discarding an oversized frame body before scanning again.
        if self.skip_remaining > 0 {
            let take = src.len().min(self.skip_remaining);
            src.advance(take);
            self.skip_remaining -= take;
            if self.skip_remaining > 0 {
                return Ok(None);
            }
        }

        if src.len() < LENGTH_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; LENGTH_HEADER_SIZE];
        header.copy_from_slice(&src[..LENGTH_HEADER_SIZE]);
        let declared = u32::from_be_bytes(header) as usize;

        if declared > self.max_frame_len {
            if self.strict {
                return Err(BrokerError::OversizedFrame(declared));
            }
            src.advance(LENGTH_HEADER_SIZE);
            let take = src.len().min(declared);
            src.advance(take);
            self.skip_remaining = declared - take;
            return Ok(Some(FrameEvent::Oversized { declared }));
        }

        if src.len() < LENGTH_HEADER_SIZE + declared {
            // Incomplete frame: reserve and wait, consuming nothing.
            src.reserve(LENGTH_HEADER_SIZE + declared - src.len());
            return Ok(None);
        }

        let frame = src.split_to(LENGTH_HEADER_SIZE + declared);
        let body = &frame[LENGTH_HEADER_SIZE..];

        match Message::from_json(body) {
            Ok(msg) => Ok(Some(FrameEvent::Message(msg))),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                warn!(len = declared, error = %e, "Dropping malformed frame");
                Ok(Some(FrameEvent::Malformed { len: declared }))
            }
        }
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = BrokerError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<()> {
        let body = msg.to_json()?;

        let len = u32::try_from(body.len())
            .map_err(|_| BrokerError::EncodeError(format!("frame of {} bytes", body.len())))?;

        dst.reserve(LENGTH_HEADER_SIZE + body.len());
        dst.put_u32(len);
        dst.put_slice(body.as_bytes());
        Ok(())
    }
}
