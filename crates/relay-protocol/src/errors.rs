//! Protocol Error Types

use relay_crypto::CryptoError;
use thiserror::Error;

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Malformed key, parameter or value text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Handshake could not complete
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Frame exceeded the configured limit
    #[error("Frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    /// Peer closed the connection
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Cipher layer error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error means the transport is gone
    ///
    /// Clean closes, resets and broken pipes are all handled the same way:
    /// the connection moves to Closed.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed | ProtocolError::Io(_))
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
