//! Client connection: dialing, framing and connectivity in one place.
//!
//! [`DialOptions`] configures a connection with a fluent API. A
//! [`ClientConn`] owns the lifecycle:
//! 1. Dial the target (bounded by the connect timeout)
//! 2. Split the stream; the read half feeds a receive buffer from a
//!    background read loop, the write half belongs to the writer task
//! 3. Encode outbound messages with the configured codec and compressor
//! 4. Parse, check and decode inbound frames on demand
//!
//! # Example
//!
//! ```ignore
//! use framewire::{dial, DialOptions, Received};
//! use framewire::compress::{GzipCompressor, GzipDecompressor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let opts = DialOptions::new()
//!         .compressor(GzipCompressor::new())
//!         .decompressor(GzipDecompressor::new());
//!     let conn = dial("127.0.0.1:7000", opts).await?;
//!
//!     conn.send(Some(&"ping".to_string())).await?;
//!     if let Received::Message(reply) = conn.recv::<String>().await? {
//!         println!("got {}", reply);
//!     }
//!
//!     conn.close();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{Codec, MsgPackCodec};
use crate::compress::{Compressor, Decompressor};
use crate::connectivity::{ConnectivityState, StateTracker};
use crate::error::{Result, WireError};
use crate::protocol::{self, Parser, Received, DEFAULT_MAX_RECV_MESSAGE_SIZE};
use crate::transport::{
    default_dialer, BoxedStream, Dialer, RecvBuffer, RecvBufferReader, RecvMsg, Terminal,
};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Default time allowed for dialing a target.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default size of a single socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Options for dialing a [`ClientConn`].
///
/// The codec is a type parameter so message types are checked at compile
/// time; it defaults to [`MsgPackCodec`].
#[derive(Clone)]
pub struct DialOptions<C = MsgPackCodec> {
    codec: C,
    compressor: Option<Arc<dyn Compressor>>,
    decompressor: Option<Arc<dyn Decompressor>>,
    recv_compress: Option<String>,
    timeout: Duration,
    dialer: Dialer,
    max_recv_message_size: u32,
    read_buffer_size: usize,
    writer_config: WriterConfig,
    cancel_token: CancellationToken,
}

impl DialOptions<MsgPackCodec> {
    /// Options with the MessagePack codec and no compression.
    pub fn new() -> Self {
        Self {
            codec: MsgPackCodec,
            compressor: None,
            decompressor: None,
            recv_compress: None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            dialer: default_dialer(),
            max_recv_message_size: DEFAULT_MAX_RECV_MESSAGE_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            writer_config: WriterConfig::default(),
            cancel_token: CancellationToken::new(),
        }
    }
}

impl Default for DialOptions<MsgPackCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DialOptions<C> {
    /// Use `codec` to marshal and unmarshal messages.
    pub fn codec<C2>(self, codec: C2) -> DialOptions<C2> {
        DialOptions {
            codec,
            compressor: self.compressor,
            decompressor: self.decompressor,
            recv_compress: self.recv_compress,
            timeout: self.timeout,
            dialer: self.dialer,
            max_recv_message_size: self.max_recv_message_size,
            read_buffer_size: self.read_buffer_size,
            writer_config: self.writer_config,
            cancel_token: self.cancel_token,
        }
    }

    /// Compress every outbound frame.
    pub fn compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Some(Arc::new(compressor));
        self
    }

    /// Install a decompressor for inbound compressed frames.
    pub fn decompressor(mut self, decompressor: impl Decompressor + 'static) -> Self {
        self.decompressor = Some(Arc::new(decompressor));
        self
    }

    /// Set the negotiated inbound encoding name.
    ///
    /// Default: the installed decompressor's name, or none.
    pub fn recv_compress(mut self, name: impl Into<String>) -> Self {
        self.recv_compress = Some(name.into());
        self
    }

    /// Set the connect timeout.
    ///
    /// Default: 20 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the function used to open the byte stream.
    pub fn dialer(mut self, dialer: Dialer) -> Self {
        self.dialer = dialer;
        self
    }

    /// Set the largest frame body accepted from the peer.
    ///
    /// Default: 1 GiB
    pub fn max_recv_message_size(mut self, limit: u32) -> Self {
        self.max_recv_message_size = limit;
        self
    }

    /// Set the size of a single socket read.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Configure the writer task.
    pub fn writer_config(mut self, config: WriterConfig) -> Self {
        self.writer_config = config;
        self
    }

    /// Tie the connection to a caller's cancellation token.
    ///
    /// Cancelling it aborts an in-flight dial and any pending read.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    fn effective_recv_compress(&self) -> String {
        match (&self.recv_compress, &self.decompressor) {
            (Some(name), _) => name.clone(),
            (None, Some(dc)) => dc.name().to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Resources of one established byte stream.
struct Link {
    writer: WriterHandle,
    parser: tokio::sync::Mutex<Parser<RecvBufferReader>>,
    cancel: CancellationToken,
    read_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl Link {
    fn shutdown(&self) {
        self.cancel.cancel();
        self.read_task.abort();
        self.writer_task.abort();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A logical connection to one target.
///
/// Share it between tasks behind an `Arc`; every method takes `&self`.
pub struct ClientConn<C = MsgPackCodec> {
    target: String,
    opts: DialOptions<C>,
    recv_compress: String,
    state: Arc<StateTracker>,
    link: Mutex<Option<Arc<Link>>>,
    cancel: CancellationToken,
}

/// Create a connection to `target` and connect it.
pub async fn dial<C>(target: impl Into<String>, opts: DialOptions<C>) -> Result<ClientConn<C>> {
    let conn = ClientConn::new(target, opts)?;
    conn.connect().await?;
    Ok(conn)
}

impl<C> ClientConn<C> {
    /// Create an `Idle` connection. No I/O happens until [`connect`](Self::connect).
    pub fn new(target: impl Into<String>, opts: DialOptions<C>) -> Result<Self> {
        let target = target.into();
        if target.is_empty() {
            return Err(WireError::UnspecifiedTarget);
        }
        let recv_compress = opts.effective_recv_compress();
        let cancel = opts.cancel_token.child_token();
        Ok(Self {
            target,
            opts,
            recv_compress,
            state: Arc::new(StateTracker::new()),
            link: Mutex::new(None),
            cancel,
        })
    }

    /// The dial target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target up to its last `:`.
    pub fn authority(&self) -> &str {
        match self.target.rfind(':') {
            Some(i) => &self.target[..i],
            None => &self.target,
        }
    }

    /// Current connectivity state.
    pub fn state(&self) -> ConnectivityState {
        self.state.state()
    }

    /// Observe connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Wait until the state differs from `from`.
    pub async fn wait_for_state_change(&self, from: ConnectivityState) -> ConnectivityState {
        self.state.wait_for_state_change(from).await
    }

    /// Dial the target and move to `Ready`.
    ///
    /// A no-op when already `Ready`. On failure the state is left in
    /// `TransientFailure`.
    pub async fn connect(&self) -> Result<()> {
        match self.state.state() {
            ConnectivityState::Ready => return Ok(()),
            ConnectivityState::Shutdown => return Err(WireError::ConnectionClosing),
            _ => {}
        }
        self.state.transition(ConnectivityState::Connecting)?;
        self.drop_link();

        tracing::debug!(addr = %self.target, "dialing");
        let stream = match self.dial_stream().await {
            Ok(stream) => stream,
            Err(e) => {
                if self.state.state() == ConnectivityState::Shutdown {
                    return Err(WireError::ConnectionClosing);
                }
                tracing::warn!(addr = %self.target, "dial failed: {}", e);
                let _ = self.state.transition(ConnectivityState::TransientFailure);
                return Err(e);
            }
        };

        let link = self.start_link(stream);
        *self.link.lock() = Some(link);

        if self.state.transition(ConnectivityState::Ready).is_err() {
            // Closed while dialing.
            self.drop_link();
            return Err(WireError::ConnectionClosing);
        }
        Ok(())
    }

    /// Connect again after a transport failure.
    pub async fn reconnect(&self) -> Result<()> {
        match self.state.state() {
            ConnectivityState::TransientFailure => self.connect().await,
            ConnectivityState::Shutdown => Err(WireError::ConnectionClosing),
            from => Err(WireError::InvalidTransition {
                from,
                to: ConnectivityState::Connecting,
            }),
        }
    }

    /// Shut the connection down.
    ///
    /// Pending reads fail with [`WireError::ConnectionClosing`]. Calling it
    /// again does nothing.
    pub fn close(&self) {
        if !self.state.shutdown() {
            return;
        }
        self.cancel.cancel();
        self.drop_link();
        tracing::debug!(addr = %self.target, "connection closed");
    }

    async fn dial_stream(&self) -> Result<BoxedStream> {
        let dial = (self.opts.dialer)(self.target.clone(), self.opts.timeout);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WireError::Cancelled),
            dialed = tokio::time::timeout(self.opts.timeout, dial) => match dialed {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(WireError::Io(e)),
                Err(_) => Err(WireError::ConnectTimeout),
            },
        }
    }

    fn start_link(&self, stream: BoxedStream) -> Arc<Link> {
        let (read_half, write_half) = tokio::io::split(stream);
        let cancel = self.cancel.child_token();

        let (buffer, handle) = RecvBuffer::new();
        let reader = RecvBufferReader::new(buffer.clone(), handle, cancel.clone());
        let parser = Parser::with_max_message_size(reader, self.opts.max_recv_message_size);

        let read_task = tokio::spawn(read_loop(
            read_half,
            buffer,
            self.state.clone(),
            cancel.clone(),
            self.cancel.clone(),
            self.opts.read_buffer_size,
        ));
        let (writer, writer_task) = spawn_writer_task(write_half, self.opts.writer_config.clone());

        Arc::new(Link {
            writer,
            parser: tokio::sync::Mutex::new(parser),
            cancel,
            read_task,
            writer_task,
        })
    }

    fn current_link(&self) -> Result<Arc<Link>> {
        self.state.ensure_ready()?;
        self.link
            .lock()
            .clone()
            .ok_or_else(|| WireError::NotReady(self.state.state()))
    }

    fn drop_link(&self) {
        if let Some(link) = self.link.lock().take() {
            link.shutdown();
        }
    }

    /// Map a failure of the active link, updating connectivity.
    ///
    /// Transport errors, protocol errors and cancellation all leave the
    /// link unusable, so each of them ends `Ready`.
    fn on_error(&self, err: WireError) -> WireError {
        match err {
            WireError::Cancelled if self.state.state() == ConnectivityState::Shutdown => {
                WireError::ConnectionClosing
            }
            err => {
                if err.is_transport()
                    || matches!(err, WireError::InvalidArgument(_) | WireError::Cancelled)
                {
                    self.state.mark_failure();
                }
                err
            }
        }
    }
}

impl<C> ClientConn<C> {
    /// Encode and queue one message. `None` sends an empty frame.
    pub async fn send<T>(&self, msg: Option<&T>) -> Result<()>
    where
        C: Codec<T>,
    {
        let link = self.current_link()?;
        let mut scratch = Vec::new();
        let frame = protocol::encode(
            &self.opts.codec,
            msg,
            self.opts.compressor.as_deref(),
            &mut scratch,
        )?;
        link.writer
            .send(OutboundFrame::new(frame))
            .await
            .map_err(|e| self.on_error(e))
    }

    /// Receive and decode the next message.
    ///
    /// [`Received::End`] means the peer closed the stream; the connection
    /// moves to `TransientFailure`.
    pub async fn recv<T>(&self) -> Result<Received<T>>
    where
        C: Codec<T>,
    {
        let link = self.current_link()?;
        let mut parser = link.parser.lock().await;
        let received = protocol::recv(
            &mut *parser,
            &self.opts.codec,
            &self.recv_compress,
            self.opts.decompressor.as_deref(),
        )
        .await;

        match received {
            Ok(Received::End) => {
                tracing::debug!(addr = %self.target, "peer closed the stream");
                self.state.mark_failure();
                Ok(Received::End)
            }
            Ok(msg) => Ok(msg),
            Err(e) => Err(self.on_error(e)),
        }
    }

    /// Whether the writer is currently applying backpressure.
    pub fn is_backpressure_active(&self) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| link.writer.is_backpressure_active())
    }
}

impl<C> Drop for ClientConn<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Move bytes from the socket into the receive buffer until the stream ends.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    buffer: RecvBuffer,
    state: Arc<StateTracker>,
    cancel: CancellationToken,
    conn_cancel: CancellationToken,
    chunk_size: usize,
) {
    let mut buf = BytesMut::with_capacity(chunk_size);
    loop {
        buf.reserve(chunk_size);
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // A caller cancel kills the link for good; a replaced link
                // leaves the state to its successor.
                if conn_cancel.is_cancelled() {
                    state.mark_failure();
                }
                return;
            }
            read = reader.read_buf(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                buffer.put(RecvMsg::Terminal(Terminal::Eof));
                return;
            }
            Ok(_) => buffer.put(RecvMsg::Data(buf.split().freeze())),
            Err(e) => {
                tracing::warn!("read loop error: {}", e);
                buffer.put(RecvMsg::Terminal(Terminal::transport(e)));
                if !cancel.is_cancelled() {
                    state.mark_failure();
                }
                return;
            }
        }
    }
}
