//! Wire Messages
//!
//! Every message is ASCII text on its own line:
//!
//! ```text
//! RSA public key   "<e>,<n>"
//! DH parameters    "<p>,<g>"
//! DH public value  "<value>"
//! Payload          "123 45 6 200 "
//! ```

use relay_crypto::{DhParameters, RsaPublicKey, BYTE_RANGE};

use crate::constants::FIELD_DELIMITER;
use crate::errors::{ProtocolError, ProtocolResult};

/// A handshake announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMessage {
    RsaKey(RsaPublicKey),
    DhParams(DhParameters),
    DhPublic(u64),
}

impl HandshakeMessage {
    /// Render as a wire line (without the delimiter)
    pub fn to_line(&self) -> String {
        match self {
            HandshakeMessage::RsaKey(key) => format!("{}{}{}", key.exponent, FIELD_DELIMITER, key.modulus),
            HandshakeMessage::DhParams(params) => {
                format!("{}{}{}", params.modulus(), FIELD_DELIMITER, params.generator())
            }
            HandshakeMessage::DhPublic(value) => value.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HandshakeMessage::RsaKey(_) => "rsa-key",
            HandshakeMessage::DhParams(_) => "dh-params",
            HandshakeMessage::DhPublic(_) => "dh-public",
        }
    }
}

fn frame_text(frame: &[u8]) -> ProtocolResult<&str> {
    std::str::from_utf8(frame)
        .map(str::trim)
        .map_err(|_| ProtocolError::Parse("frame is not ASCII text".into()))
}

fn parse_int(field: &str, what: &str) -> ProtocolResult<u64> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|_| ProtocolError::Parse(format!("{} is not an integer: {:?}", what, field)))
}

fn parse_pair<'a>(frame: &'a [u8], what: &str) -> ProtocolResult<(&'a str, &'a str)> {
    let text = frame_text(frame)?;
    text.split_once(FIELD_DELIMITER)
        .ok_or_else(|| ProtocolError::Parse(format!("{} missing '{}' delimiter: {:?}", what, FIELD_DELIMITER, text)))
}

/// Parse `"<e>,<n>"`
///
/// The modulus must exceed the byte range or byte-wise encryption under the
/// key would be lossy.
pub fn parse_rsa_key(frame: &[u8]) -> ProtocolResult<RsaPublicKey> {
    let (e, n) = parse_pair(frame, "RSA key")?;
    let exponent = parse_int(e, "RSA exponent")?;
    let modulus = parse_int(n, "RSA modulus")?;

    if exponent == 0 {
        return Err(ProtocolError::Parse("RSA exponent must be positive".into()));
    }
    if modulus < BYTE_RANGE {
        return Err(ProtocolError::Parse(format!("RSA modulus {} too small", modulus)));
    }
    Ok(RsaPublicKey::new(exponent, modulus))
}

/// Parse `"<p>,<g>"`, which must name an entry of the fixed parameter table
pub fn parse_dh_params(frame: &[u8]) -> ProtocolResult<DhParameters> {
    let (p, g) = parse_pair(frame, "DH parameters")?;
    let modulus = parse_int(p, "DH modulus")?;
    let generator = parse_int(g, "DH generator")?;
    DhParameters::from_table(modulus, generator).map_err(|e| ProtocolError::Parse(e.to_string()))
}

/// Parse a bare DH public value, which must be a residue in `[1, p)`
pub fn parse_dh_public(frame: &[u8], params: &DhParameters) -> ProtocolResult<u64> {
    let value = parse_int(frame_text(frame)?, "DH public value")?;
    if value == 0 || value >= params.modulus() {
        return Err(ProtocolError::Parse(format!(
            "DH public value {} outside [1, {})",
            value, params.modulus()
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_lines() {
        assert_eq!(HandshakeMessage::RsaKey(RsaPublicKey::new(7, 3233)).to_line(), "7,3233");
        assert_eq!(
            HandshakeMessage::DhParams(DhParameters::new(23, 5).unwrap()).to_line(),
            "23,5"
        );
        assert_eq!(HandshakeMessage::DhPublic(19).to_line(), "19");
    }

    #[test]
    fn test_parse_rsa_key() {
        assert_eq!(parse_rsa_key(b"7,3233").unwrap(), RsaPublicKey::new(7, 3233));
        assert_eq!(parse_rsa_key(b" 5 , 323 \r").unwrap(), RsaPublicKey::new(5, 323));
    }

    #[test]
    fn test_parse_rsa_key_errors() {
        assert!(matches!(parse_rsa_key(b"73233"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse_rsa_key(b"7,abc"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse_rsa_key(b"0,3233"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse_rsa_key(b"3,15"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse_rsa_key(b"\xff,1"), Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn test_parse_dh_params() {
        let params = parse_dh_params(b"47,5").unwrap();
        assert_eq!(params.modulus(), 47);
        assert_eq!(params.generator(), 5);

        assert!(matches!(parse_dh_params(b"47"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse_dh_params(b"48,5"), Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn test_parse_dh_params_off_table() {
        assert!(matches!(parse_dh_params(b"23,5"), Err(ProtocolError::Parse(_))));
        assert!(matches!(
            parse_dh_params(b"1000000000039,2"),
            Err(ProtocolError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_dh_public() {
        let params = DhParameters::new(23, 5).unwrap();
        assert_eq!(parse_dh_public(b"19", &params).unwrap(), 19);
        assert!(parse_dh_public(b"0", &params).is_err());
        assert!(parse_dh_public(b"23", &params).is_err());
        assert!(parse_dh_public(b"", &params).is_err());
    }
}
