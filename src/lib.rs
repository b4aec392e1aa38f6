//! # framewire
//!
//! Length-prefixed message framing for RPC-style byte streams.
//!
//! Every message travels as one frame:
//!
//! ```text
//! ┌──────────┬────────────────┬───────────────────┐
//! │ format   │ length (u32 BE)│ body              │
//! │ 1 byte   │ 4 bytes        │ `length` bytes    │
//! └──────────┴────────────────┴───────────────────┘
//! ```
//!
//! `format` is `0` for a plain body and `1` for a body compressed with the
//! negotiated algorithm.
//!
//! ## Architecture
//!
//! - **Codec**: pluggable message serialization ([`codec`])
//! - **Compression**: named compressor/decompressor plugins ([`compress`])
//! - **Protocol**: frame encode, parse and receive pipeline ([`protocol`])
//! - **Transport**: dialing plus the ordered receive buffer that
//!   decouples socket reads from frame parsing ([`transport`])
//! - **Connectivity**: the connection lifecycle state machine ([`connectivity`])
//!
//! ## Example
//!
//! ```ignore
//! use framewire::{dial, DialOptions, Received};
//!
//! #[tokio::main]
//! async fn main() -> framewire::Result<()> {
//!     let conn = dial("127.0.0.1:7000", DialOptions::new()).await?;
//!     conn.send(Some(&"hello".to_string())).await?;
//!
//!     match conn.recv::<String>().await? {
//!         Received::Message(reply) => println!("{}", reply),
//!         Received::Empty => println!("empty frame"),
//!         Received::End => println!("peer closed"),
//!     }
//!     conn.close();
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod compress;
pub mod connectivity;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;

pub use client::{dial, ClientConn, DialOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};
pub use connectivity::ConnectivityState;
pub use error::{Result, WireError};
pub use protocol::Received;
