//! Logical message framing
//!
//! Frame layout: `u32` big-endian payload length, then that many bytes of
//! UTF-8. Chunks and status messages are short; the frame cap exists only
//! to fail fast on a corrupt or hostile peer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use voice_relay_core::TransportError;

/// Upper bound on a single frame's payload.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Write one logical message.
pub async fn write_message<W>(writer: &mut W, message: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let payload = message.as_bytes();
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            length: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one logical message, blocking until a full frame arrives.
///
/// A clean EOF before the length prefix maps to `ConnectionClosed`; an EOF
/// mid-frame surfaces as the underlying IO error.
pub async fn read_message<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin,
{
    let length = match reader.read_u32().await {
        Ok(length) => length as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    };

    if length > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            length,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    Ok(String::from_utf8(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_message(&mut client, "hello 世界").await.unwrap();
        let message = read_message(&mut server).await.unwrap();
        assert_eq!(message, "hello 世界");
    }

    #[tokio::test]
    async fn test_empty_message() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_message(&mut client, "").await.unwrap();
        assert_eq!(read_message(&mut server).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_clean_eof_is_connection_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);

        tokio::io::AsyncWriteExt::write_u32(&mut client, (MAX_FRAME_LEN + 1) as u32)
            .await
            .unwrap();

        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }
}
