//! Protocol Constants
//!
//! Ports, frame limits, key defaults and deployment profiles.

use serde::{Deserialize, Serialize};

/// Default TCP port of the relay server
pub const DEFAULT_PORT: u16 = 8001;

/// Default upper bound on one wire frame, newline excluded
///
/// Large enough for a full [`MAX_MESSAGE_LEN`](relay_crypto::MAX_MESSAGE_LEN)
/// message once every byte is widened into a decimal integer and a space,
/// for any RSA modulus below 10^7. Handshakes refuse wider keys.
pub const DEFAULT_MAX_FRAME_LEN: usize = 8192;

/// Smallest frame limit a configuration may set
pub const MIN_FRAME_LEN: usize = 16;

/// Frame delimiter
pub const FRAME_DELIMITER: u8 = b'\n';

/// Separator inside `"<a>,<b>"` handshake announcements
pub const FIELD_DELIMITER: char = ',';

/// Primes for the server keypair when none are configured (n = 3233)
pub const DEFAULT_SERVER_PRIMES: (u64, u64) = (61, 53);

/// Range clients draw their keypair primes from
pub const DEFAULT_CLIENT_PRIME_RANGE: (u64, u64) = (17, 97);

/// Which cipher layers a deployment stacks
///
/// Both ends of a connection must run the same profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherProfile {
    /// No handshake, messages relayed as plain text
    Plain,
    /// RSA key swap, byte-wise RSA on every message
    Rsa,
    /// RSA key swap then DH; substitution cipher wrapped by RSA
    #[default]
    Layered,
}

impl CipherProfile {
    /// Whether the handshake swaps RSA public keys
    pub fn uses_rsa(self) -> bool {
        matches!(self, CipherProfile::Rsa | CipherProfile::Layered)
    }

    /// Whether the handshake negotiates a DH secret
    pub fn uses_dh(self) -> bool {
        matches!(self, CipherProfile::Layered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CipherProfile::Plain => "plain",
            CipherProfile::Rsa => "rsa",
            CipherProfile::Layered => "layered",
        }
    }
}

impl std::fmt::Display for CipherProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CipherProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(CipherProfile::Plain),
            "rsa" => Ok(CipherProfile::Rsa),
            "layered" => Ok(CipherProfile::Layered),
            other => Err(format!("unknown cipher profile: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_capabilities() {
        assert!(!CipherProfile::Plain.uses_rsa());
        assert!(CipherProfile::Rsa.uses_rsa());
        assert!(!CipherProfile::Rsa.uses_dh());
        assert!(CipherProfile::Layered.uses_rsa());
        assert!(CipherProfile::Layered.uses_dh());
        assert_eq!(CipherProfile::default(), CipherProfile::Layered);
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("RSA".parse::<CipherProfile>().unwrap(), CipherProfile::Rsa);
        assert_eq!("layered".parse::<CipherProfile>().unwrap(), CipherProfile::Layered);
        assert!("caesar".parse::<CipherProfile>().is_err());
        assert_eq!(CipherProfile::Plain.to_string(), "plain");
    }

    #[test]
    fn test_frame_limit_fits_full_message() {
        // 3233 → four digits plus a space per byte
        assert!(relay_crypto::MAX_MESSAGE_LEN * 5 <= DEFAULT_MAX_FRAME_LEN);
    }
}
