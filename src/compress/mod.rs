//! Compression plugins for frame bodies.
//!
//! A [`Compressor`] / [`Decompressor`] pair is identified by name. When a
//! frame arrives tagged as compressed, the receiver only decompresses it if
//! the negotiated encoding name matches the installed decompressor's name
//! (see [`crate::protocol::check_recv_payload`]).
//!
//! Compression is all-or-nothing per frame.

mod gzip;

use crate::error::Result;

pub use gzip::{GzipCompressor, GzipDecompressor};

/// Compresses a frame body.
pub trait Compressor: Send + Sync {
    /// Compress `input` into `out`.
    ///
    /// `out` is cleared by the caller before each frame.
    fn compress(&self, input: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Name of the compression algorithm (e.g. `"gzip"`).
    fn name(&self) -> &str;
}

/// Decompresses a frame body.
pub trait Decompressor: Send + Sync {
    /// Decompress a complete frame body.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Name of the compression algorithm (e.g. `"gzip"`).
    fn name(&self) -> &str;
}
