//! Abstract request-reply channels
//!
//! The relay speaks to both of its peers through strict request-reply
//! channels: upstream it serves replies, downstream it drives requests.
//! The transport crate provides the TCP implementations; tests substitute
//! in-memory mocks.

use async_trait::async_trait;

use crate::TransportError;

/// A bound, serving request-reply endpoint (the upstream side).
///
/// Protocol: `recv` one message, then `send` exactly one reply before the
/// next `recv`. Both calls block indefinitely; there is no timeout.
#[async_trait]
pub trait ReplyChannel: Send {
    /// Block until the next inbound message arrives.
    async fn recv(&mut self) -> Result<String, TransportError>;

    /// Send the reply for the message last received.
    async fn send(&mut self, reply: &str) -> Result<(), TransportError>;

    /// Release the endpoint. Called once, on the shutdown path.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A connecting request-reply endpoint (the downstream side).
///
/// Every request is paired with exactly one reply before the next request
/// may be issued, so at most one message is ever in flight.
#[async_trait]
pub trait RequestChannel: Send {
    /// Send one message and block until the peer's reply arrives.
    async fn request(&mut self, message: &str) -> Result<String, TransportError>;

    /// Release the endpoint. Called once, on the shutdown path.
    async fn close(&mut self) -> Result<(), TransportError>;
}
