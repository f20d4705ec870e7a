//! # Relay Core
//!
//! Integer arithmetic underneath every cipher layer of cipher-relay.
//!
//! ## Components
//!
//! - **Modular arithmetic**: square-and-multiply exponentiation, naive
//!   inverse search, Euclidean gcd
//! - **Primality**: 6k±1 trial division and random prime selection
//!
//! ## Scale
//!
//! Every value here is a small machine integer. The arithmetic is exact but
//! deliberately offers no cryptographic strength: the inverse search is
//! linear in the modulus and keys are products of two-digit primes.

pub mod arithmetic;
pub mod errors;
pub mod primes;

pub use arithmetic::*;
pub use errors::*;
pub use primes::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arithmetic::*;
    pub use crate::errors::*;
    pub use crate::primes::*;
}
