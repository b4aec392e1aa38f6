//! Gzip compression via flate2.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{Compressor, Decompressor};
use crate::error::{Result, WireError};

const GZIP: &str = "gzip";

fn failed(e: std::io::Error) -> WireError {
    WireError::Compression {
        algorithm: GZIP.to_string(),
        message: e.to_string(),
    }
}

/// Gzip compressor. Each frame body is a complete gzip member.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// Create a compressor with the default level.
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Create a compressor with an explicit level (0-9, out of range falls
    /// back to the default).
    pub fn with_level(level: u32) -> Self {
        let level = match level {
            0..=9 => Compression::new(level),
            _ => Compression::default(),
        };
        Self { level }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let mut enc = GzEncoder::new(out, self.level);
        enc.write_all(input).map_err(failed)?;
        enc.finish().map_err(failed)?;
        Ok(())
    }

    fn name(&self) -> &str {
        GZIP
    }
}

/// Gzip decompressor.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipDecompressor;

impl GzipDecompressor {
    /// Create a decompressor.
    pub fn new() -> Self {
        Self
    }
}

impl Decompressor for GzipDecompressor {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut dec = GzDecoder::new(input);
        let mut out = Vec::new();
        dec.read_to_end(&mut out).map_err(failed)?;
        Ok(out)
    }

    fn name(&self) -> &str {
        GZIP
    }
}
