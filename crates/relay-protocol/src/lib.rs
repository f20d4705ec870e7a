//! # Relay Protocol
//!
//! The line-oriented wire protocol of cipher-relay:
//! - Newline-delimited ASCII frames with a configurable size limit
//! - RSA key swap, then per-connection Diffie-Hellman
//! - Payloads sealed by a per-connection [`ChannelCipher`]
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                 Server
//!   |                                      |
//!   |------- "e,n" ----------------------->|
//!   |<------ "e,n" ------------------------|
//!   |<------ "p,g" ------------------------|
//!   |<------ "A" --------------------------|
//!   |------- "B" ------------------------->|
//!   |                                      |
//!   |======== Registered, relaying ========|
//!   |                                      |
//!   |<------ "123 45 6 200 " ------------->|
//!   |    (substitution, then RSA)          |
//! ```

pub mod cipher;
pub mod constants;
pub mod errors;
pub mod framing;
pub mod handshake;
pub mod session;
pub mod wire;

pub use cipher::*;
pub use constants::*;
pub use errors::*;
pub use framing::*;
pub use handshake::*;
pub use session::*;
pub use wire::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cipher::*;
    pub use crate::constants::*;
    pub use crate::errors::*;
    pub use crate::framing::*;
    pub use crate::handshake::*;
    pub use crate::session::*;
    pub use crate::wire::*;
}
