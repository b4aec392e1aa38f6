//! Error types for framewire.

use std::io;

use thiserror::Error;

use crate::connectivity::ConnectivityState;

/// Main error type for all framewire operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a frame header or body.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Protocol violation (unknown payload format, encoding mismatch, oversized frame).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Marshal/unmarshal failure reported by a codec.
    #[error("codec {codec} failed: {message}")]
    Codec {
        /// Name of the codec that failed.
        codec: &'static str,
        /// Underlying error message.
        message: String,
    },

    /// Compress/decompress failure reported by a compression plugin.
    #[error("compression {algorithm} failed: {message}")]
    Compression {
        /// Name of the compression algorithm.
        algorithm: String,
        /// Underlying error message.
        message: String,
    },

    /// Operation attempted while the connection is not ready.
    #[error("connection is not ready (state: {0})")]
    NotReady(ConnectivityState),

    /// Operation attempted on a connection that has been shut down.
    #[error("the client connection is closing")]
    ConnectionClosing,

    /// Dial did not complete within the configured timeout.
    #[error("timed out trying to connect")]
    ConnectTimeout,

    /// Dial target is empty.
    #[error("target is unspecified")]
    UnspecifiedTarget,

    /// Requested connectivity transition is not allowed.
    #[error("invalid connectivity transition from {from} to {to}")]
    InvalidTransition {
        /// State the machine was in.
        from: ConnectivityState,
        /// State that was requested.
        to: ConnectivityState,
    },

    /// A pending read was cancelled by the caller.
    #[error("read cancelled")]
    Cancelled,

    /// Writer task is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write queue full.
    #[error("backpressure timeout")]
    BackpressureTimeout,
}

impl WireError {
    /// Whether this error means the underlying transport was lost.
    ///
    /// These are the failures that move a ready connection into
    /// `TransientFailure`.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WireError::Io(_) | WireError::UnexpectedEof | WireError::ConnectionClosed
        )
    }

    /// Convert an error returned by an `AsyncRead` into a framewire error.
    ///
    /// `UnexpectedEof` and cancellation markers are mapped to their
    /// dedicated variants; everything else stays an I/O error.
    pub fn from_read_error(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return WireError::UnexpectedEof;
        }
        if err.get_ref().is_some_and(|inner| inner.is::<Cancelled>()) {
            return WireError::Cancelled;
        }
        WireError::Io(err)
    }
}

/// Marker carried inside an `io::Error` when a stream read is cancelled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("read cancelled")]
pub struct Cancelled;

impl From<Cancelled> for io::Error {
    fn from(c: Cancelled) -> Self {
        io::Error::other(c)
    }
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;
