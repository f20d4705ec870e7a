//! Server Errors
//!
//! Error types for the relay server.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Server is already running
    #[error("Server is already running")]
    AlreadyRunning,

    /// Failed to bind to address
    #[error("Failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] relay_protocol::ProtocolError),

    /// Key material error
    #[error("Crypto error: {0}")]
    Crypto(#[from] relay_crypto::CryptoError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError::Config(e.to_string())
    }
}

impl ServerError {
    /// Whether the error just means the peer went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            ServerError::Io(_) => true,
            ServerError::Protocol(e) => e.is_disconnect(),
            _ => false,
        }
    }
}
