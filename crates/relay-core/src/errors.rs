//! Error types for relay-core

use thiserror::Error;

/// Errors raised by the arithmetic layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Exhaustive inverse search found no candidate
    #[error("No modular inverse of {value} modulo {modulus}")]
    NoInverseExists { value: u64, modulus: u64 },

    /// A value expected to be prime is composite (or < 2)
    #[error("{0} is not prime")]
    NotPrime(u64),

    /// A prime range holds no prime or is inverted
    #[error("No prime in range [{min}, {max}]")]
    InvalidRange { min: u64, max: u64 },

    /// Reduction modulo zero
    #[error("Modulus must be non-zero")]
    ZeroModulus,
}

/// Result type for relay-core operations
pub type CoreResult<T> = Result<T, CoreError>;
