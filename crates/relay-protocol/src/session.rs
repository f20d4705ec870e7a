//! Connection Sessions
//!
//! Per-connection key material as seen from one endpoint: the peer's RSA
//! public key and the DH agreement negotiated for this connection only.

use relay_crypto::{DhKeyMaterial, RsaKeyPair, RsaPublicKey};

use crate::cipher::ChannelCipher;
use crate::constants::CipherProfile;
use crate::errors::ProtocolResult;

/// Identifies one accepted connection for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// RSA key swap, then DH parameter and value swap
    Handshaking,
    /// Registered and relaying
    Active,
    /// Terminal
    Closed,
}

/// DH agreement for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhAgreement {
    own: DhKeyMaterial,
    peer_public: u64,
}

impl DhAgreement {
    pub fn new(own: DhKeyMaterial, peer_public: u64) -> Self {
        Self { own, peer_public }
    }

    pub fn own(&self) -> &DhKeyMaterial {
        &self.own
    }

    pub fn peer_public(&self) -> u64 {
        self.peer_public
    }

    pub fn modulus(&self) -> u64 {
        self.own.params().modulus()
    }

    /// Recompute the shared secret of this connection
    pub fn session_key(&self) -> ProtocolResult<u64> {
        Ok(self.own.shared_key(self.peer_public)?)
    }
}

/// State of one connection after its handshake
///
/// The substitution key is never stored; it is recomputed from the DH
/// agreement whenever a message is sealed or opened.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    handle: ConnectionHandle,
    profile: CipherProfile,
    peer_key: Option<RsaPublicKey>,
    dh: Option<DhAgreement>,
    phase: ConnectionPhase,
}

impl ConnectionSession {
    pub fn new(
        handle: ConnectionHandle,
        profile: CipherProfile,
        peer_key: Option<RsaPublicKey>,
        dh: Option<DhAgreement>,
    ) -> Self {
        Self {
            handle,
            profile,
            peer_key,
            dh,
            phase: ConnectionPhase::Handshaking,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn profile(&self) -> CipherProfile {
        self.profile
    }

    pub fn peer_key(&self) -> Option<RsaPublicKey> {
        self.peer_key
    }

    pub fn dh(&self) -> Option<&DhAgreement> {
        self.dh.as_ref()
    }

    pub fn peer_dh_public(&self) -> Option<u64> {
        self.dh.map(|dh| dh.peer_public())
    }

    pub fn own_dh_private(&self) -> Option<u64> {
        self.dh.map(|dh| dh.own().private_exponent())
    }

    pub fn shared_modulus(&self) -> Option<u64> {
        self.dh.map(|dh| dh.modulus())
    }

    /// DH secret of this connection, if the profile negotiates one
    pub fn session_key(&self) -> ProtocolResult<Option<u64>> {
        self.dh.map(|dh| dh.session_key()).transpose()
    }

    /// Build the cipher for traffic on this connection
    pub fn channel_cipher(&self, own_keys: &RsaKeyPair) -> ProtocolResult<ChannelCipher> {
        ChannelCipher::for_session(self, own_keys)
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == ConnectionPhase::Active
    }

    pub fn mark_active(&mut self) {
        self.phase = ConnectionPhase::Active;
    }

    pub fn mark_closed(&mut self) {
        self.phase = ConnectionPhase::Closed;
    }
}
