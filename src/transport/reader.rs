//! Sequential byte reader over a [`RecvBuffer`].
//!
//! [`RecvBufferReader`] implements [`AsyncRead`] so the frame parser can
//! pull fixed-size headers and variable-size bodies out of the chunks the
//! network loop delivered. Reads wait on two conditions: the next hand-off
//! item and the reader's cancellation token. Whichever has fired when the
//! reader is polled wins; cancellation is checked first.
//!
//! Errors are sticky: once a read fails (transport error, cancellation) or
//! hits end of stream, every later read reports the same thing.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::recv_buffer::{RecvBuffer, RecvHandle, RecvMsg, Terminal};
use crate::error::Cancelled;

#[derive(Debug, Clone)]
enum Sticky {
    Eof,
    Transport(std::sync::Arc<io::Error>),
    Cancelled,
}

impl Sticky {
    fn to_io_error(&self) -> Option<io::Error> {
        match self {
            Sticky::Eof => None,
            Sticky::Transport(e) => Some(io::Error::new(e.kind(), e.to_string())),
            Sticky::Cancelled => Some(Cancelled.into()),
        }
    }
}

/// Reads bytes out of a receive buffer, honouring a cancellation token.
pub struct RecvBufferReader {
    buffer: RecvBuffer,
    handle: RecvHandle,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    /// Remaining bytes of the most recently delivered chunk.
    last: Bytes,
    err: Option<Sticky>,
}

impl RecvBufferReader {
    /// Create a reader draining `handle`, promoting through `buffer`.
    pub fn new(buffer: RecvBuffer, handle: RecvHandle, cancel: CancellationToken) -> Self {
        Self {
            buffer,
            handle,
            cancelled: Box::pin(cancel.cancelled_owned()),
            last: Bytes::new(),
            err: None,
        }
    }

    /// Whether a read has already failed or reached end of stream.
    pub fn is_terminated(&self) -> bool {
        self.err.is_some()
    }

    fn finish(&mut self, sticky: Sticky) -> Poll<io::Result<()>> {
        let result = match sticky.to_io_error() {
            Some(e) => Err(e),
            None => Ok(()),
        };
        self.err = Some(sticky);
        Poll::Ready(result)
    }
}

impl AsyncRead for RecvBufferReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if let Some(sticky) = &this.err {
            return Poll::Ready(match sticky.to_io_error() {
                Some(e) => Err(e),
                None => Ok(()),
            });
        }

        // Empty chunks carry nothing; keep polling until bytes or a terminal.
        while !this.last.has_remaining() {
            if this.cancelled.as_mut().poll(cx).is_ready() {
                tracing::debug!("receive buffer read cancelled");
                return this.finish(Sticky::Cancelled);
            }

            match this.handle.poll_get(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(RecvMsg::Data(data)) => {
                    this.buffer.load();
                    this.last = data;
                }
                Poll::Ready(RecvMsg::Terminal(Terminal::Eof)) => {
                    this.buffer.load();
                    return this.finish(Sticky::Eof);
                }
                Poll::Ready(RecvMsg::Terminal(Terminal::Transport(e))) => {
                    this.buffer.load();
                    return this.finish(Sticky::Transport(e));
                }
            }
        }

        let n = this.last.remaining().min(buf.remaining());
        buf.put_slice(&this.last[..n]);
        this.last.advance(n);
        Poll::Ready(Ok(()))
    }
}
