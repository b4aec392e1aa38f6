//! Dialing the byte stream a connection runs over.
//!
//! The default dialer understands two target forms:
//! - `host:port` - TCP
//! - `unix:/path/to/socket` - Unix Domain Socket (Unix only)
//!
//! A custom [`Dialer`] can be installed through
//! [`DialOptions::dialer`](crate::DialOptions::dialer), e.g. to dial through
//! a proxy or hand back an in-memory stream in tests.
//!
//! # Example
//!
//! ```ignore
//! use framewire::transport::dialer_fn;
//!
//! let dialer = dialer_fn(|addr, _timeout| async move {
//!     let stream = tokio::net::TcpStream::connect(addr).await?;
//!     stream.set_nodelay(true)?;
//!     Ok(Box::new(stream) as framewire::transport::BoxedStream)
//! });
//! ```

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Prefix selecting a Unix Domain Socket target.
pub const UNIX_PREFIX: &str = "unix:";

/// A bidirectional byte stream a connection can run over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased transport stream.
pub type BoxedStream = Box<dyn Transport>;

/// Future returned by a dialer.
pub type DialFuture = Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send>>;

/// Function used to dial a target address.
///
/// Receives the target and the configured connect timeout. The connection
/// enforces the timeout itself; dialers may use it to configure the socket.
pub type Dialer = Arc<dyn Fn(String, Duration) -> DialFuture + Send + Sync>;

/// Wrap an async closure as a [`Dialer`].
pub fn dialer_fn<F, Fut>(f: F) -> Dialer
where
    F: Fn(String, Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<BoxedStream>> + Send + 'static,
{
    Arc::new(move |addr, timeout| Box::pin(f(addr, timeout)) as DialFuture)
}

/// The dialer used when none is configured.
pub fn default_dialer() -> Dialer {
    dialer_fn(|addr, _timeout| async move { dial_target(&addr).await })
}

/// Connect to `target` over TCP or, with a `unix:` prefix, a Unix socket.
pub async fn dial_target(target: &str) -> io::Result<BoxedStream> {
    if let Some(path) = target.strip_prefix(UNIX_PREFIX) {
        return dial_unix(path).await;
    }

    let stream = TcpStream::connect(target).await?;
    stream.set_nodelay(true)?;
    Ok(Box::new(stream))
}

#[cfg(unix)]
async fn dial_unix(path: &str) -> io::Result<BoxedStream> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn dial_unix(path: &str) -> io::Result<BoxedStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("unix sockets are not supported on this platform: {}", path),
    ))
}
