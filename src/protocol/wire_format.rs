//! Wire format encoding and decoding.
//!
//! Every frame starts with a 5-byte header:
//! ```text
//! ┌──────────┬──────────┬──────────────────┐
//! │ Format   │ Length   │ Body             │
//! │ 1 byte   │ 4 bytes  │ Length bytes     │
//! │ 0 / 1    │ uint32 BE│ (absent if 0)    │
//! └──────────┴──────────┴──────────────────┘
//! ```
//!
//! Format `0` is an uncompressed body, `1` a compressed one.

use crate::error::{Result, WireError};

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Largest body the 4-byte length field can describe.
pub const MAX_FRAME_BODY: usize = u32::MAX as usize;

/// Default maximum body accepted by a parser (1 GB).
pub const DEFAULT_MAX_RECV_MESSAGE_SIZE: u32 = 1_073_741_824;

/// Payload format tag carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadFormat {
    /// Body is not compressed.
    None = 0,
    /// Body is compressed with the negotiated algorithm.
    Compressed = 1,
}

impl TryFrom<u8> for PayloadFormat {
    type Error = WireError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(PayloadFormat::None),
            1 => Ok(PayloadFormat::Compressed),
            other => Err(WireError::InvalidArgument(format!(
                "received unexpected payload format {}",
                other
            ))),
        }
    }
}

impl From<PayloadFormat> for u8 {
    fn from(pf: PayloadFormat) -> u8 {
        pf as u8
    }
}

/// Decoded frame header.
///
/// The format byte is kept raw: an unknown value is a protocol error, but
/// it is reported when the frame is checked, not when it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw payload format tag.
    pub format: u8,
    /// Body length in bytes.
    pub length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(format: PayloadFormat, length: u32) -> Self {
        Self {
            format: format.into(),
            length,
        }
    }

    /// Encode header to bytes (Big Endian length).
    ///
    /// # Example
    ///
    /// ```
    /// use framewire::protocol::{Header, PayloadFormat};
    ///
    /// let bytes = Header::new(PayloadFormat::Compressed, 258).encode();
    /// assert_eq!(bytes, [1, 0, 0, 1, 2]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (5 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = self.format;
        buf[1..5].copy_from_slice(&self.length.to_be_bytes());
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            format: buf[0],
            length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }

    /// Interpret the format byte.
    pub fn payload_format(&self) -> Result<PayloadFormat> {
        PayloadFormat::try_from(self.format)
    }

    /// Check the announced body length against a receive limit.
    pub fn validate(&self, max_message_size: u32) -> Result<()> {
        if self.length > max_message_size {
            return Err(WireError::InvalidArgument(format!(
                "received message larger than max ({} vs. {})",
                self.length, max_message_size
            )));
        }
        Ok(())
    }
}
