//! Protocol module - wire format, framing, and the receive pipeline.
//!
//! This module implements the message framing used on the wire:
//! - 5-byte header encoding/decoding
//! - [`encode`]: marshal, compress and frame an outbound message
//! - [`Parser`] and [`recv`]: read, check, decompress and unmarshal inbound frames

mod frame;
mod parser;
mod wire_format;

pub use frame::{encode, Frame};
pub use parser::{check_recv_payload, recv, Parser, Received};
pub use wire_format::{
    Header, PayloadFormat, DEFAULT_MAX_RECV_MESSAGE_SIZE, HEADER_SIZE, MAX_FRAME_BODY,
};
