//! Client Errors
//!
//! Error types for the chat client.

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection failed
    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// Handshake failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Handshake timeout
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] relay_protocol::ProtocolError),

    /// Key material error
    #[error("Crypto error: {0}")]
    Crypto(#[from] relay_crypto::CryptoError),

    /// Invalid server address
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    /// DNS resolution failed
    #[error("DNS resolution failed for {host}: {reason}")]
    DnsResolutionFailed { host: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the server simply went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Protocol(e) => e.is_disconnect(),
            _ => false,
        }
    }
}
