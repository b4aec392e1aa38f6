//! Raw codec - pass-through for binary data.
//!
//! Used when the payload is already serialized. `Bytes` messages are
//! passed through without copying.
//!
//! # Example
//!
//! ```
//! use framewire::codec::{Codec, RawCodec};
//! use bytes::Bytes;
//!
//! let bytes = Bytes::from_static(b"zero copy");
//! let passed = RawCodec.marshal(&bytes).unwrap();
//! assert_eq!(passed.as_ptr(), bytes.as_ptr()); // Same memory
//! ```

use bytes::Bytes;

use super::Codec;
use crate::error::Result;

/// Raw codec that passes bytes through without transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl RawCodec {
    /// Codec name.
    pub const NAME: &'static str = "raw";
}

impl Codec<Bytes> for RawCodec {
    #[inline]
    fn marshal(&self, value: &Bytes) -> Result<Bytes> {
        Ok(value.clone())
    }

    #[inline]
    fn unmarshal(&self, data: Bytes) -> Result<Bytes> {
        Ok(data)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl Codec<Vec<u8>> for RawCodec {
    #[inline]
    fn marshal(&self, value: &Vec<u8>) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value))
    }

    #[inline]
    fn unmarshal(&self, data: Bytes) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
