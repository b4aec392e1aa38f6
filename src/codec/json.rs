//! JSON codec using `serde_json`.
//!
//! Handy for debugging a wire capture or talking to peers without a
//! MessagePack implementation.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::{Result, WireError};

/// JSON codec for structured data.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Codec name.
    pub const NAME: &'static str = "json";
}

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn marshal(&self, value: &T) -> Result<Bytes> {
        let bytes = serde_json::to_vec(value).map_err(|e| WireError::Codec {
            codec: Self::NAME,
            message: e.to_string(),
        })?;
        Ok(Bytes::from(bytes))
    }

    fn unmarshal(&self, data: Bytes) -> Result<T> {
        serde_json::from_slice(&data).map_err(|e| WireError::Codec {
            codec: Self::NAME,
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
