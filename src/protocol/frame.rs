//! Frame encoding and the parsed frame type.
//!
//! # Example
//!
//! ```
//! use framewire::codec::MsgPackCodec;
//! use framewire::protocol::{encode, HEADER_SIZE};
//!
//! let mut scratch = Vec::new();
//! let bytes = encode(&MsgPackCodec, Some(&"hello".to_string()), None, &mut scratch).unwrap();
//! assert_eq!(bytes[0], 0); // uncompressed
//! assert_eq!(bytes.len(), HEADER_SIZE + 6); // fixstr header + 5 chars
//! ```

use bytes::Bytes;

use super::wire_format::{Header, PayloadFormat, HEADER_SIZE, MAX_FRAME_BODY};
use crate::codec::Codec;
use crate::compress::Compressor;
use crate::error::{Result, WireError};

/// A complete frame read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw payload format tag.
    pub format: u8,
    /// Body bytes (empty for a zero-length frame).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(format: u8, payload: Bytes) -> Self {
        Self { format, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether this frame carries no application payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Check that a body fits in the 4-byte length field.
pub(crate) fn frame_length(len: usize) -> Result<u32> {
    if len > MAX_FRAME_BODY {
        return Err(WireError::InvalidArgument(format!(
            "message too large ({} bytes)",
            len
        )));
    }
    Ok(len as u32)
}

/// Serialize `msg` and prepend the frame header.
///
/// A `None` message produces a 5-byte frame with tag `none` and length 0.
/// When a compressor is given, the marshaled body is compressed into
/// `scratch` (cleared first) and the frame is tagged `compressed`.
///
/// # Errors
///
/// Codec and compression failures are returned as-is. A body that does not
/// fit in the 32-bit length field fails with `InvalidArgument` and produces
/// no output.
pub fn encode<T, C>(
    codec: &C,
    msg: Option<&T>,
    compressor: Option<&dyn Compressor>,
    scratch: &mut Vec<u8>,
) -> Result<Vec<u8>>
where
    C: Codec<T> + ?Sized,
{
    let Some(msg) = msg else {
        return Ok(Header::new(PayloadFormat::None, 0).encode().to_vec());
    };

    let marshaled = codec.marshal(msg)?;
    let (format, body): (PayloadFormat, &[u8]) = match compressor {
        Some(cp) => {
            scratch.clear();
            cp.compress(&marshaled, scratch)?;
            (PayloadFormat::Compressed, scratch.as_slice())
        }
        None => (PayloadFormat::None, &marshaled[..]),
    };

    let length = frame_length(body.len())?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&Header::new(format, length).encode());
    buf.extend_from_slice(body);
    Ok(buf)
}
