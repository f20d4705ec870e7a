//! Handshake State Machines
//!
//! Both sides are driven frame by frame and never touch the transport; the
//! caller writes whatever messages a step returns.
//!
//! ## Handshake Flow (`layered` profile)
//!
//! ```text
//! Client                                          Server
//!   |                                               |
//!   |------------- "e_c,n_c" (RSA key) ----------->|
//!   |                                               |
//!   |<------------ "e_s,n_s" (RSA key) ------------|
//!   |<------------ "p,g"     (DH params) ----------|
//!   |<------------ "A"       (DH public) ----------|
//!   |                                               |
//!   |------------- "B"       (DH public) --------->|
//!   |                                               |
//!   |============ Encrypted relay ready ============|
//! ```
//!
//! The `rsa` profile stops after the key swap; `plain` skips the handshake
//! entirely.

use rand::Rng;
use relay_crypto::{DhKeyMaterial, DhParameters, RsaPublicKey};
use tracing::debug;

use crate::cipher::sealed_frame_len;
use crate::constants::{CipherProfile, DEFAULT_MAX_FRAME_LEN};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::session::{ConnectionHandle, ConnectionSession, DhAgreement};
use crate::wire::{parse_dh_params, parse_dh_public, parse_rsa_key, HandshakeMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Client has not announced its key yet
    Initial,
    AwaitingPeerKey,
    AwaitingDhParams,
    AwaitingDhPublic,
    Complete,
    Failed,
}

impl HandshakeState {
    pub fn is_finished(self) -> bool {
        matches!(self, HandshakeState::Complete | HandshakeState::Failed)
    }
}

/// Reject a peer key whose ciphertext could not fit in one frame
fn require_frame_fit(key: &RsaPublicKey, max_frame_len: usize) -> ProtocolResult<()> {
    let needed = sealed_frame_len(key.modulus);
    if needed > max_frame_len {
        return Err(ProtocolError::HandshakeFailed(format!(
            "RSA modulus {} needs frames of {} bytes, limit is {}",
            key.modulus, needed, max_frame_len
        )));
    }
    Ok(())
}

/// Server-side handshake for one accepted connection
pub struct ServerHandshake {
    handle: ConnectionHandle,
    profile: CipherProfile,
    server_key: RsaPublicKey,
    max_frame_len: usize,
    state: HandshakeState,
    peer_key: Option<RsaPublicKey>,
    own_dh: Option<DhKeyMaterial>,
    agreement: Option<DhAgreement>,
}

impl ServerHandshake {
    pub fn new(handle: ConnectionHandle, profile: CipherProfile, server_key: RsaPublicKey) -> Self {
        let state = if profile.uses_rsa() {
            HandshakeState::AwaitingPeerKey
        } else {
            HandshakeState::Complete
        };

        Self {
            handle,
            profile,
            server_key,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            state,
            peer_key: None,
            own_dh: None,
            agreement: None,
        }
    }

    /// Frame limit the peer's key must respect; defaults to
    /// [`DEFAULT_MAX_FRAME_LEN`]
    pub fn with_frame_limit(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == HandshakeState::Complete
    }

    /// Consume one client frame, returning the replies to send in order
    ///
    /// Any error leaves the handshake in [`HandshakeState::Failed`].
    pub fn on_frame<R: Rng + ?Sized>(
        &mut self,
        frame: &[u8],
        rng: &mut R,
    ) -> ProtocolResult<Vec<HandshakeMessage>> {
        let result = self.step(frame, rng);
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn step<R: Rng + ?Sized>(&mut self, frame: &[u8], rng: &mut R) -> ProtocolResult<Vec<HandshakeMessage>> {
        match self.state {
            HandshakeState::AwaitingPeerKey => {
                let peer_key = parse_rsa_key(frame)?;
                require_frame_fit(&peer_key, self.max_frame_len)?;
                self.peer_key = Some(peer_key);
                let mut replies = vec![HandshakeMessage::RsaKey(self.server_key)];

                if self.profile.uses_dh() {
                    let params = DhParameters::random(rng);
                    let own = DhKeyMaterial::generate(params, rng)?;
                    replies.push(HandshakeMessage::DhParams(params));
                    replies.push(HandshakeMessage::DhPublic(own.public_value()));
                    self.own_dh = Some(own);
                    self.state = HandshakeState::AwaitingDhPublic;
                } else {
                    self.state = HandshakeState::Complete;
                }
                Ok(replies)
            }
            HandshakeState::AwaitingDhPublic => {
                let own = self
                    .own_dh
                    .ok_or_else(|| ProtocolError::InvalidState("no DH material".into()))?;
                let client_public = parse_dh_public(frame, &own.params())?;
                self.agreement = Some(DhAgreement::new(own, client_public));
                self.state = HandshakeState::Complete;
                debug!("{} agreed on DH modulus {}", self.handle, own.params().modulus());
                Ok(Vec::new())
            }
            state => Err(ProtocolError::InvalidState(format!(
                "{} received a handshake frame in state {:?}",
                self.handle, state
            ))),
        }
    }

    /// Session for the completed handshake
    pub fn finish(self) -> ProtocolResult<ConnectionSession> {
        if self.state != HandshakeState::Complete {
            return Err(ProtocolError::HandshakeFailed(format!(
                "{} finished in state {:?}",
                self.handle, self.state
            )));
        }
        Ok(ConnectionSession::new(self.handle, self.profile, self.peer_key, self.agreement))
    }
}

/// Client-side handshake
pub struct ClientHandshake {
    profile: CipherProfile,
    own_key: RsaPublicKey,
    max_frame_len: usize,
    state: HandshakeState,
    peer_key: Option<RsaPublicKey>,
    params: Option<DhParameters>,
    agreement: Option<DhAgreement>,
}

impl ClientHandshake {
    pub fn new(profile: CipherProfile, own_key: RsaPublicKey) -> Self {
        Self {
            profile,
            own_key,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            state: HandshakeState::Initial,
            peer_key: None,
            params: None,
            agreement: None,
        }
    }

    /// Frame limit the peer's key must respect; defaults to
    /// [`DEFAULT_MAX_FRAME_LEN`]
    pub fn with_frame_limit(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == HandshakeState::Complete
    }

    /// Opening messages; the client speaks first
    pub fn start(&mut self) -> ProtocolResult<Vec<HandshakeMessage>> {
        if self.state != HandshakeState::Initial {
            return Err(ProtocolError::InvalidState("handshake already started".into()));
        }

        if self.profile.uses_rsa() {
            self.state = HandshakeState::AwaitingPeerKey;
            Ok(vec![HandshakeMessage::RsaKey(self.own_key)])
        } else {
            self.state = HandshakeState::Complete;
            Ok(Vec::new())
        }
    }

    /// Consume one server frame, returning the replies to send in order
    pub fn on_frame<R: Rng + ?Sized>(
        &mut self,
        frame: &[u8],
        rng: &mut R,
    ) -> ProtocolResult<Vec<HandshakeMessage>> {
        let result = self.step(frame, rng);
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn step<R: Rng + ?Sized>(&mut self, frame: &[u8], rng: &mut R) -> ProtocolResult<Vec<HandshakeMessage>> {
        match self.state {
            HandshakeState::AwaitingPeerKey => {
                let peer_key = parse_rsa_key(frame)?;
                require_frame_fit(&peer_key, self.max_frame_len)?;
                self.peer_key = Some(peer_key);
                self.state = if self.profile.uses_dh() {
                    HandshakeState::AwaitingDhParams
                } else {
                    HandshakeState::Complete
                };
                Ok(Vec::new())
            }
            HandshakeState::AwaitingDhParams => {
                self.params = Some(parse_dh_params(frame)?);
                self.state = HandshakeState::AwaitingDhPublic;
                Ok(Vec::new())
            }
            HandshakeState::AwaitingDhPublic => {
                let params = self
                    .params
                    .ok_or_else(|| ProtocolError::InvalidState("no DH parameters".into()))?;
                let server_public = parse_dh_public(frame, &params)?;
                let own = DhKeyMaterial::generate(params, rng)?;
                self.agreement = Some(DhAgreement::new(own, server_public));
                self.state = HandshakeState::Complete;
                Ok(vec![HandshakeMessage::DhPublic(own.public_value())])
            }
            state => Err(ProtocolError::InvalidState(format!(
                "client received a handshake frame in state {:?}",
                state
            ))),
        }
    }

    /// Session for the completed handshake
    ///
    /// A client holds a single connection, so its handle is always `#0`.
    pub fn finish(self) -> ProtocolResult<ConnectionSession> {
        if self.state != HandshakeState::Complete {
            return Err(ProtocolError::HandshakeFailed(format!(
                "client finished in state {:?}",
                self.state
            )));
        }
        Ok(ConnectionSession::new(
            ConnectionHandle::new(0),
            self.profile,
            self.peer_key,
            self.agreement,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_crypto::RsaKeyPair;

    /// Run both machines against each other, passing lines as the wire would
    fn run(profile: CipherProfile) -> (ConnectionSession, ConnectionSession) {
        let mut rng = rand::thread_rng();
        let server_keys = RsaKeyPair::generate(61, 53).unwrap();
        let client_keys = RsaKeyPair::generate(17, 19).unwrap();

        let mut server = ServerHandshake::new(ConnectionHandle::new(1), profile, server_keys.public_key());
        let mut client = ClientHandshake::new(profile, client_keys.public_key());

        let mut to_server: Vec<String> = client.start().unwrap().iter().map(|m| m.to_line()).collect();
        while !(server.is_complete() && client.is_complete()) {
            let mut to_client = Vec::new();
            for line in to_server.drain(..) {
                to_client.extend(server.on_frame(line.as_bytes(), &mut rng).unwrap());
            }
            for msg in to_client {
                let replies = client.on_frame(msg.to_line().as_bytes(), &mut rng).unwrap();
                to_server.extend(replies.iter().map(|m| m.to_line()));
            }
        }

        (server.finish().unwrap(), client.finish().unwrap())
    }

    #[test]
    fn test_layered_handshake_agrees() {
        let (server, client) = run(CipherProfile::Layered);
        assert_eq!(server.session_key().unwrap(), client.session_key().unwrap());
        assert!(server.session_key().unwrap().is_some());
        assert_eq!(server.shared_modulus(), client.shared_modulus());
        assert_eq!(server.peer_key().unwrap(), RsaPublicKey::new(5, 323));
        assert_eq!(client.peer_key().unwrap(), RsaPublicKey::new(7, 3233));
    }

    #[test]
    fn test_rsa_handshake_skips_dh() {
        let (server, client) = run(CipherProfile::Rsa);
        assert!(server.dh().is_none());
        assert!(client.dh().is_none());
        assert!(server.peer_key().is_some());
    }

    #[test]
    fn test_plain_handshake_is_empty() {
        let keys = RsaKeyPair::generate(61, 53).unwrap();
        let server = ServerHandshake::new(ConnectionHandle::new(1), CipherProfile::Plain, keys.public_key());
        assert!(server.is_complete());

        let mut client = ClientHandshake::new(CipherProfile::Plain, keys.public_key());
        assert!(client.start().unwrap().is_empty());
        assert!(client.is_complete());
    }

    #[test]
    fn test_server_reply_order() {
        let mut rng = rand::thread_rng();
        let keys = RsaKeyPair::generate(61, 53).unwrap();
        let mut server = ServerHandshake::new(ConnectionHandle::new(4), CipherProfile::Layered, keys.public_key());

        let replies = server.on_frame(b"5,323", &mut rng).unwrap();
        let kinds: Vec<_> = replies.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, ["rsa-key", "dh-params", "dh-public"]);
        assert_eq!(replies[0].to_line(), "7,3233");
        assert_eq!(server.state(), HandshakeState::AwaitingDhPublic);
    }

    #[test]
    fn test_malformed_key_fails() {
        let mut rng = rand::thread_rng();
        let keys = RsaKeyPair::generate(61, 53).unwrap();
        let mut server = ServerHandshake::new(ConnectionHandle::new(5), CipherProfile::Layered, keys.public_key());

        assert!(matches!(
            server.on_frame(b"not a key", &mut rng),
            Err(ProtocolError::Parse(_))
        ));
        assert_eq!(server.state(), HandshakeState::Failed);
        assert!(matches!(server.finish(), Err(ProtocolError::HandshakeFailed(_))));
    }

    #[test]
    fn test_peer_key_must_fit_frame_limit() {
        let mut rng = rand::thread_rng();
        let keys = RsaKeyPair::generate(61, 53).unwrap();

        let mut server = ServerHandshake::new(ConnectionHandle::new(6), CipherProfile::Rsa, keys.public_key());
        assert!(matches!(
            server.on_frame(b"5,100700549", &mut rng),
            Err(ProtocolError::HandshakeFailed(_))
        ));
        assert_eq!(server.state(), HandshakeState::Failed);

        let mut roomy = ServerHandshake::new(ConnectionHandle::new(7), CipherProfile::Rsa, keys.public_key())
            .with_frame_limit(16_384);
        assert_eq!(roomy.on_frame(b"5,100700549", &mut rng).unwrap().len(), 1);
        assert!(roomy.is_complete());

        let mut client = ClientHandshake::new(CipherProfile::Rsa, keys.public_key()).with_frame_limit(4096);
        client.start().unwrap();
        assert!(matches!(
            client.on_frame(b"7,3233", &mut rng),
            Err(ProtocolError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn test_frame_after_complete_rejected() {
        let mut rng = rand::thread_rng();
        let keys = RsaKeyPair::generate(61, 53).unwrap();
        let mut client = ClientHandshake::new(CipherProfile::Rsa, keys.public_key());
        client.start().unwrap();
        client.on_frame(b"7,3233", &mut rng).unwrap();
        assert!(client.is_complete());

        assert!(matches!(
            client.on_frame(b"7,3233", &mut rng),
            Err(ProtocolError::InvalidState(_))
        ));
        assert!(client.state().is_finished());
    }

    #[test]
    fn test_client_rejects_unknown_dh_parameters() {
        let mut rng = rand::thread_rng();
        let keys = RsaKeyPair::generate(17, 19).unwrap();
        let mut client = ClientHandshake::new(CipherProfile::Layered, keys.public_key());
        client.start().unwrap();
        client.on_frame(b"7,3233", &mut rng).unwrap();

        assert!(matches!(
            client.on_frame(b"1000000000039,2", &mut rng),
            Err(ProtocolError::Parse(_))
        ));
        assert_eq!(client.state(), HandshakeState::Failed);
        assert!(matches!(
            client.on_frame(b"5", &mut rng),
            Err(ProtocolError::InvalidState(_))
        ));
    }

    #[test]
    fn test_start_twice_rejected() {
        let keys = RsaKeyPair::generate(61, 53).unwrap();
        let mut client = ClientHandshake::new(CipherProfile::Layered, keys.public_key());
        client.start().unwrap();
        assert!(client.start().is_err());
    }
}
