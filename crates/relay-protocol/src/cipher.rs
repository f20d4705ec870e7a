//! Channel Cipher
//!
//! The cipher for one connection, built from the session's profile:
//!
//! | profile   | outbound layers                         | inbound layers                     |
//! |-----------|-----------------------------------------|------------------------------------|
//! | `plain`   | none                                    | none                               |
//! | `rsa`     | RSA(peer public)                        | RSA(own private)                   |
//! | `layered` | substitution(DH key), RSA(peer public)  | substitution(DH key), RSA(own private) |

use relay_crypto::{CipherPipeline, RsaKeyPair, RsaLayer, SubstitutionLayer, MAX_MESSAGE_LEN};

use crate::constants::CipherProfile;
use crate::errors::{ProtocolError, ProtocolResult};
use crate::session::ConnectionSession;

/// Outbound and inbound pipelines of one connection
#[derive(Debug)]
pub struct ChannelCipher {
    outbound: CipherPipeline,
    inbound: CipherPipeline,
}

impl ChannelCipher {
    /// Cipher for traffic between this endpoint and the session's peer
    ///
    /// # Errors
    /// [`ProtocolError::InvalidState`] if the session lacks key material the
    /// profile requires.
    pub fn for_session(session: &ConnectionSession, own_keys: &RsaKeyPair) -> ProtocolResult<Self> {
        let mut outbound = CipherPipeline::new();
        let mut inbound = CipherPipeline::new();

        if session.profile().uses_dh() {
            let key = session.session_key()?.ok_or_else(|| {
                ProtocolError::InvalidState(format!("{} has no DH agreement", session.handle()))
            })?;
            outbound.push(SubstitutionLayer::new(key));
            inbound.push(SubstitutionLayer::new(key));
        }

        if session.profile().uses_rsa() {
            let peer = session.peer_key().ok_or_else(|| {
                ProtocolError::InvalidState(format!("{} has no peer RSA key", session.handle()))
            })?;
            outbound.push(RsaLayer::encrypting(peer));
            inbound.push(RsaLayer::decrypting(own_keys.private_key()));
        }

        Ok(Self { outbound, inbound })
    }

    /// Identity cipher
    pub fn plain() -> Self {
        Self {
            outbound: CipherPipeline::new(),
            inbound: CipherPipeline::new(),
        }
    }

    pub fn profile_layers(&self) -> Vec<&'static str> {
        self.outbound.layer_names()
    }

    /// Encrypt a plaintext message into a wire frame
    ///
    /// Plaintext beyond [`MAX_MESSAGE_LEN`] bytes is dropped.
    pub fn seal(&self, plaintext: &[u8]) -> ProtocolResult<Vec<u8>> {
        let plaintext = &plaintext[..plaintext.len().min(MAX_MESSAGE_LEN)];
        Ok(self.outbound.encode(plaintext)?)
    }

    /// Decrypt a wire frame into plaintext
    pub fn open(&self, frame: &[u8]) -> ProtocolResult<Vec<u8>> {
        Ok(self.inbound.decode(frame)?)
    }
}

/// Longest frame [`ChannelCipher::seal`] can produce for a peer whose RSA
/// modulus is `modulus`
///
/// Each plaintext byte becomes one residue below the modulus followed by a
/// space.
pub fn sealed_frame_len(modulus: u64) -> usize {
    let digits = modulus
        .saturating_sub(1)
        .checked_ilog10()
        .map_or(1, |d| d as usize + 1);
    MAX_MESSAGE_LEN * (digits + 1)
}

impl CipherProfile {
    /// Layer names a profile stacks, outermost last
    pub fn layer_names(self) -> &'static [&'static str] {
        match self {
            CipherProfile::Plain => &[],
            CipherProfile::Rsa => &["rsa"],
            CipherProfile::Layered => &["substitution", "rsa"],
        }
    }
}
