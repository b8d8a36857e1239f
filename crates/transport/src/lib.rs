//! TCP request-reply transport
//!
//! Implements the relay's two abstract channels over TCP with a minimal
//! logical-message framing: a 4-byte big-endian length prefix followed by
//! the UTF-8 payload. One frame is one message, so a reply always pairs
//! with the request that preceded it.

mod framing;
mod tcp;

pub use framing::{read_message, write_message, MAX_FRAME_LEN};
pub use tcp::{TcpReplyChannel, TcpRequestChannel};
