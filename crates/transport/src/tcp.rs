//! TCP channel implementations
//!
//! `TcpReplyChannel` is the bound upstream endpoint; it outlives any one
//! client and simply accepts the next connection when the current one goes
//! away. `TcpRequestChannel` is the connecting downstream endpoint and
//! re-dials its fixed peer on the request after a failure.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use voice_relay_core::{ReplyChannel, RequestChannel, TransportError};

use crate::framing::{read_message, write_message};

/// Bound request-reply endpoint serving one upstream client at a time.
pub struct TcpReplyChannel {
    listener: TcpListener,
    client: Option<TcpStream>,
}

impl TcpReplyChannel {
    /// Bind the upstream endpoint.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr, "Upstream endpoint listening");
        Ok(Self {
            listener,
            client: None,
        })
    }

    /// The actual bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl ReplyChannel for TcpReplyChannel {
    async fn recv(&mut self) -> Result<String, TransportError> {
        loop {
            if self.client.is_none() {
                let (stream, peer) = self.listener.accept().await?;
                tracing::info!(%peer, "Upstream client connected");
                self.client = Some(stream);
            }

            let Some(stream) = self.client.as_mut() else {
                continue;
            };

            match read_message(stream).await {
                Ok(message) => return Ok(message),
                Err(TransportError::ConnectionClosed) => {
                    tracing::info!("Upstream client disconnected, awaiting next");
                    self.client = None;
                }
                Err(e) => {
                    self.client = None;
                    return Err(e);
                }
            }
        }
    }

    async fn send(&mut self, reply: &str) -> Result<(), TransportError> {
        let Some(stream) = self.client.as_mut() else {
            return Err(TransportError::ConnectionClosed);
        };

        let result = write_message(stream, reply).await;
        if result.is_err() {
            self.client = None;
        }
        result
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.client.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}

/// Connecting request-reply endpoint against a fixed downstream peer.
pub struct TcpRequestChannel {
    peer: String,
    stream: Option<TcpStream>,
}

impl TcpRequestChannel {
    /// Connect to the downstream peer.
    pub async fn connect(peer: impl Into<String>) -> Result<Self, TransportError> {
        let peer = peer.into();
        let stream = TcpStream::connect(&peer).await?;
        tracing::info!(peer, "Connected to downstream peer");
        Ok(Self {
            peer,
            stream: Some(stream),
        })
    }
}

async fn exchange(stream: &mut TcpStream, message: &str) -> Result<String, TransportError> {
    write_message(stream, message).await?;
    read_message(stream).await
}

#[async_trait]
impl RequestChannel for TcpRequestChannel {
    async fn request(&mut self, message: &str) -> Result<String, TransportError> {
        if self.stream.is_none() {
            tracing::info!(peer = %self.peer, "Reconnecting to downstream peer");
            self.stream = Some(TcpStream::connect(&self.peer).await?);
        }

        let result = match self.stream.as_mut() {
            Some(stream) => exchange(stream, message).await,
            None => Err(TransportError::ConnectionClosed),
        };

        // A dead connection is re-dialed on the next request, not retried
        // within this one; the caller decides what the failure means.
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_channel_serves_one_exchange() {
        let mut channel = TcpReplyChannel::bind("127.0.0.1:0").await.unwrap();
        let addr = channel.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_message(&mut stream, "hello").await.unwrap();
            read_message(&mut stream).await.unwrap()
        });

        let utterance = channel.recv().await.unwrap();
        assert_eq!(utterance, "hello");
        channel.send("done").await.unwrap();

        assert_eq!(client.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_reply_channel_accepts_next_client_after_disconnect() {
        let mut channel = TcpReplyChannel::bind("127.0.0.1:0").await.unwrap();
        let addr = channel.local_addr().unwrap();

        // First client connects and leaves without sending anything.
        let first = TcpStream::connect(addr).await.unwrap();
        drop(first);

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_message(&mut stream, "second").await.unwrap();
            read_message(&mut stream).await.unwrap()
        });

        assert_eq!(channel.recv().await.unwrap(), "second");
        channel.send("ok").await.unwrap();
        assert_eq!(client.await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_request_channel_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Fake synthesis peer: acknowledge every chunk with OK.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            loop {
                match read_message(&mut stream).await {
                    Ok(chunk) => {
                        assert!(!chunk.is_empty());
                        write_message(&mut stream, "OK").await.unwrap();
                    }
                    Err(_) => break,
                }
            }
        });

        let mut channel = TcpRequestChannel::connect(addr.to_string()).await.unwrap();
        assert_eq!(channel.request("Hi there.").await.unwrap(), "OK");
        assert_eq!(channel.request("Bye.").await.unwrap(), "OK");
        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_channel_error_when_peer_gone() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Peer accepts, then hangs up immediately.
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
            drop(listener);
        });

        let mut channel = TcpRequestChannel::connect(addr.to_string()).await.unwrap();

        // Give the peer task a moment to drop the connection.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(channel.request("chunk").await.is_err());
    }
}
