//! Transport module - the inbound side of a connection and dialing.
//!
//! - [`RecvBuffer`] / [`RecvHandle`]: unbounded, order-preserving hand-off
//!   from the socket read loop to the single reader
//! - [`RecvBufferReader`]: `AsyncRead` over the receive buffer with
//!   cancellation
//! - [`Dialer`]: pluggable connect function (TCP / Unix socket by default)

mod dialer;
mod reader;
mod recv_buffer;

pub use dialer::{
    default_dialer, dial_target, dialer_fn, BoxedStream, DialFuture, Dialer, Transport,
    UNIX_PREFIX,
};
pub use reader::RecvBufferReader;
pub use recv_buffer::{RecvBuffer, RecvHandle, RecvMsg, Terminal};
