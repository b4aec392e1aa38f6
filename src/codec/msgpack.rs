//! MsgPack codec using `rmp-serde`.
//!
//! Always serializes with `to_vec_named` so structs go on the wire as maps
//! (with field names) rather than positional arrays. Peers decoding into
//! their own schema rely on the field names.
//!
//! # Example
//!
//! ```
//! use framewire::codec::{Codec, MsgPackCodec};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = MsgPackCodec.marshal(&msg).unwrap();
//! let decoded: Message = MsgPackCodec.unmarshal(encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::{Result, WireError};

/// MessagePack codec for structured data. This is the default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Codec name.
    pub const NAME: &'static str = "msgpack";
}

impl<T> Codec<T> for MsgPackCodec
where
    T: Serialize + DeserializeOwned,
{
    #[inline]
    fn marshal(&self, value: &T) -> Result<Bytes> {
        let bytes = rmp_serde::to_vec_named(value).map_err(|e| WireError::Codec {
            codec: Self::NAME,
            message: e.to_string(),
        })?;
        Ok(Bytes::from(bytes))
    }

    #[inline]
    fn unmarshal(&self, data: Bytes) -> Result<T> {
        rmp_serde::from_slice(&data).map_err(|e| WireError::Codec {
            codec: Self::NAME,
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
