//! Frame parsing and the receive pipeline.
//!
//! [`Parser`] pulls complete frames out of any `AsyncRead`. [`recv`] drives
//! one frame through the whole inbound pipeline: parse, payload format
//! check, decompression, unmarshal.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::frame::Frame;
use super::wire_format::{Header, PayloadFormat, DEFAULT_MAX_RECV_MESSAGE_SIZE, HEADER_SIZE};
use crate::codec::Codec;
use crate::compress::Decompressor;
use crate::error::{Result, WireError};

/// Outcome of receiving one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received<T> {
    /// A frame with a body, unmarshaled by the codec.
    Message(T),
    /// A zero-length frame: no application payload.
    Empty,
    /// The peer finished the message sequence cleanly.
    End,
}

impl<T> Received<T> {
    /// Return the message, if this is one.
    pub fn into_message(self) -> Option<T> {
        match self {
            Received::Message(m) => Some(m),
            Received::Empty | Received::End => None,
        }
    }

    /// Whether the message sequence has ended.
    pub fn is_end(&self) -> bool {
        matches!(self, Received::End)
    }
}

/// A protocol failure that ended the frame sequence.
#[derive(Debug, Clone)]
enum Poisoned {
    Protocol(String),
    UnexpectedEof,
}

impl Poisoned {
    fn from_error(err: &WireError) -> Option<Self> {
        match err {
            WireError::InvalidArgument(msg) => Some(Poisoned::Protocol(msg.clone())),
            WireError::UnexpectedEof => Some(Poisoned::UnexpectedEof),
            _ => None,
        }
    }

    fn to_error(&self) -> WireError {
        match self {
            Poisoned::Protocol(msg) => WireError::InvalidArgument(msg.clone()),
            Poisoned::UnexpectedEof => WireError::UnexpectedEof,
        }
    }
}

/// Reads complete frames from the underlying reader.
///
/// Partial header and body bytes are kept in the parser, so a
/// [`recv_msg`](Parser::recv_msg) future dropped mid-frame (e.g. by a
/// timeout) loses nothing: the next call resumes where it stopped.
///
/// Protocol errors and truncation are sticky. Once the stream is out of
/// step with the frame boundaries, every later call fails the same way.
pub struct Parser<R> {
    reader: R,
    header: [u8; HEADER_SIZE],
    header_filled: usize,
    body: Option<BytesMut>,
    body_filled: usize,
    max_message_size: u32,
    poisoned: Option<Poisoned>,
}

impl<R: AsyncRead + Unpin> Parser<R> {
    /// Create a parser with the default receive limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_message_size(reader, DEFAULT_MAX_RECV_MESSAGE_SIZE)
    }

    /// Create a parser rejecting bodies larger than `max_message_size`.
    pub fn with_max_message_size(reader: R, max_message_size: u32) -> Self {
        Self {
            reader,
            header: [0u8; HEADER_SIZE],
            header_filled: 0,
            body: None,
            body_filled: 0,
            max_message_size,
            poisoned: None,
        }
    }

    /// Read one complete frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before any header
    /// byte. A stream ending inside a header or body is
    /// [`WireError::UnexpectedEof`].
    ///
    /// Cancel safe.
    pub async fn recv_msg(&mut self) -> Result<Option<Frame>> {
        if let Some(p) = &self.poisoned {
            return Err(p.to_error());
        }
        let result = self.read_frame().await;
        if let Err(e) = &result {
            self.poison(e);
        }
        result
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        while self.header_filled < HEADER_SIZE {
            let n = self
                .reader
                .read(&mut self.header[self.header_filled..])
                .await
                .map_err(WireError::from_read_error)?;
            if n == 0 {
                if self.header_filled == 0 {
                    return Ok(None);
                }
                return Err(WireError::UnexpectedEof);
            }
            self.header_filled += n;
        }

        let header = Header::decode(&self.header).ok_or(WireError::UnexpectedEof)?;
        header.validate(self.max_message_size)?;

        let body = self
            .body
            .get_or_insert_with(|| BytesMut::zeroed(header.length as usize));
        while self.body_filled < body.len() {
            let n = self
                .reader
                .read(&mut body[self.body_filled..])
                .await
                .map_err(WireError::from_read_error)?;
            if n == 0 {
                return Err(WireError::UnexpectedEof);
            }
            self.body_filled += n;
        }

        let body = self.body.take().unwrap_or_default();
        self.header_filled = 0;
        self.body_filled = 0;
        Ok(Some(Frame::new(header.format, body.freeze())))
    }

    /// Make `err` the answer to every later call, if it ends the stream.
    fn poison(&mut self, err: &WireError) {
        if self.poisoned.is_none() {
            self.poisoned = Poisoned::from_error(err);
        }
    }

    /// Whether a protocol error or truncation has ended the stream.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Get a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the parser, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Check a received payload format against the negotiated encoding.
///
/// - `none` is always accepted, even when compression was negotiated.
/// - `compressed` needs a non-empty `recv_compress` equal to the installed
///   decompressor's name.
/// - Any other tag is rejected.
pub fn check_recv_payload(
    format: u8,
    recv_compress: &str,
    decompressor: Option<&dyn Decompressor>,
) -> Result<PayloadFormat> {
    let pf = PayloadFormat::try_from(format)?;
    if pf == PayloadFormat::Compressed {
        if recv_compress.is_empty() {
            return Err(WireError::InvalidArgument(format!(
                "invalid encoding {:?} with compression enabled",
                recv_compress
            )));
        }
        match decompressor {
            Some(dc) if dc.name() == recv_compress => {}
            _ => {
                return Err(WireError::InvalidArgument(format!(
                    "decompressor is not installed for encoding {:?}",
                    recv_compress
                )));
            }
        }
    }
    Ok(pf)
}

/// Receive one frame and unmarshal it with `codec`.
///
/// A clean end of stream yields [`Received::End`]; a zero-length frame
/// yields [`Received::Empty`] without consulting the codec.
pub async fn recv<T, C, R>(
    parser: &mut Parser<R>,
    codec: &C,
    recv_compress: &str,
    decompressor: Option<&dyn Decompressor>,
) -> Result<Received<T>>
where
    C: Codec<T> + ?Sized,
    R: AsyncRead + Unpin,
{
    let Some(frame) = parser.recv_msg().await? else {
        return Ok(Received::End);
    };

    let pf = match check_recv_payload(frame.format, recv_compress, decompressor) {
        Ok(pf) => pf,
        Err(e) => {
            parser.poison(&e);
            return Err(e);
        }
    };

    if frame.is_empty() {
        return Ok(Received::Empty);
    }

    let data = match (pf, decompressor) {
        (PayloadFormat::Compressed, Some(dc)) => Bytes::from(dc.decompress(&frame.payload)?),
        _ => frame.payload,
    };

    Ok(Received::Message(codec.unmarshal(data)?))
}
