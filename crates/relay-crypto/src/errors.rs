//! Error types for relay-crypto

use relay_core::CoreError;
use thiserror::Error;

/// Errors that can occur in relay-crypto operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// No usable public exponent or private exponent for the primes
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// RSA primes must differ
    #[error("RSA primes must be distinct")]
    DuplicatePrimes,

    /// Byte-granular RSA needs a modulus above the byte range
    #[error("RSA modulus {modulus} cannot encode bytes (must exceed 255)")]
    ModulusTooSmall { modulus: u64 },

    /// DH parameters failed validation
    #[error("Invalid Diffie-Hellman parameters: {0}")]
    InvalidParameters(String),

    /// Ciphertext text could not be parsed
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// A layer was asked to run a direction it holds no key for
    #[error("Missing {0} key")]
    MissingKey(&'static str),

    /// Arithmetic error from relay-core
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for relay-crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
