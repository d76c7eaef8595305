//! Length-prefixed JSON framing.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ JSON body (variable)     │
//! │ Big-endian u32   │                          │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! An oversized length header is unrecoverable (the stream can no longer be
//! resynchronized). A body that fails to deserialize is consumed and reported,
//! and decoding continues with the next frame.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, Result};

/// Maximum accepted frame body, 1 MiB
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Encode a value into a complete frame (header + body)
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(value)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Incremental decoder for a byte stream of frames
///
/// Feed it whatever the socket produced with [`FrameDecoder::extend`], then
/// drain complete values with [`FrameDecoder::decode_next`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the stream
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed by a complete frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete frame, if one is buffered
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn decode_next<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buffer[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        if self.buffer.len() < HEADER_LEN + len {
            self.buffer.reserve(HEADER_LEN + len - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let body = self.buffer.split_to(len);
        serde_json::from_slice(&body).map(Some).map_err(ProtocolError::from)
    }
}
