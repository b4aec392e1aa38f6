//! Codec module - serialization/deserialization for payloads.
//!
//! A [`Codec`] turns an application message into the bytes carried in a
//! frame body and back. Exactly one codec is active per connection; it is
//! chosen when the connection is configured, never by inspecting the payload.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (the default)
//! - [`JsonCodec`] - JSON using `serde_json`
//! - [`RawCodec`] - pass-through for raw bytes (zero-copy)
//!
//! # Example
//!
//! ```
//! use framewire::codec::{Codec, MsgPackCodec, RawCodec};
//! use bytes::Bytes;
//!
//! let encoded = MsgPackCodec.marshal(&"hello".to_string()).unwrap();
//! let decoded: String = MsgPackCodec.unmarshal(encoded).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let raw = RawCodec.marshal(&Bytes::from_static(b"binary data")).unwrap();
//! assert_eq!(&raw[..], b"binary data");
//! ```

mod json;
mod msgpack;
mod raw;

use bytes::Bytes;

use crate::error::Result;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;

/// Marshals and unmarshals messages of type `T`.
///
/// Implementations are stateless and shared across concurrent frames
/// without locking.
pub trait Codec<T>: Send + Sync {
    /// Serialize a message into a frame body.
    fn marshal(&self, value: &T) -> Result<Bytes>;

    /// Deserialize a frame body into a message.
    fn unmarshal(&self, data: Bytes) -> Result<T>;

    /// Name of this codec.
    fn name(&self) -> &'static str;
}
