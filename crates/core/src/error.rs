//! Error types for the voice relay

use thiserror::Error;

/// Result type alias using `RelayError`.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that are fatal to a turn.
///
/// Downstream transport failures are deliberately absent: the orchestrator
/// recovers them locally into a `DeliveryFailed` outcome. What remains here
/// is what the relay cannot answer for within the turn — the upstream
/// channel itself, or the generation collaborator.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The upstream request-reply channel failed.
    #[error("Upstream transport error: {0}")]
    Upstream(TransportError),

    /// The generation collaborator failed.
    #[error("Generation error: {0}")]
    Generation(String),
}

/// Transport-level channel errors.
///
/// Channel operations return these as values; the orchestrator matches on
/// the call site (upstream vs downstream) to decide recovery.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge { length: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::Generation("backend unreachable".to_string());
        assert_eq!(err.to_string(), "Generation error: backend unreachable");

        let err = RelayError::Upstream(TransportError::ConnectionClosed);
        assert!(err.to_string().contains("Connection closed"));
    }
}
