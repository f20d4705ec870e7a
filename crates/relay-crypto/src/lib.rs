//! # Relay Crypto
//!
//! Cipher layers for cipher-relay, built on the integer arithmetic of
//! `relay-core`.
//!
//! ## Components
//!
//! - **RSA**: per-process keypairs, byte-granular integer encryption
//! - **Diffie-Hellman**: per-connection shared secrets over a small prime field
//! - **Substitution**: alphabetic shift keyed by the DH secret
//! - **Pipeline**: stackable [`CipherLayer`]s
//!
//! ## Security
//!
//! None to speak of. Moduli are products of two-digit primes and the
//! substitution layer has 26 keys. The layers preserve the behaviour of
//! the wire protocol, not cryptographic strength.

pub mod diffie_hellman;
pub mod errors;
pub mod pipeline;
pub mod rsa;
pub mod substitution;

pub use diffie_hellman::*;
pub use errors::*;
pub use pipeline::*;
pub use rsa::*;
pub use substitution::{SubstitutionCipher, BLOCK_SIZE, MAX_MESSAGE_LEN};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::diffie_hellman::*;
    pub use crate::errors::*;
    pub use crate::pipeline::*;
    pub use crate::rsa::*;
    pub use crate::substitution::{SubstitutionCipher, BLOCK_SIZE, MAX_MESSAGE_LEN};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_roundtrip() {
        let mut rng = rand::thread_rng();

        // Server and client keypairs
        let server = RsaKeyPair::generate(61, 53).unwrap();
        let client = RsaKeyPair::generate_random(17, 97, &mut rng).unwrap();

        // DH over one connection
        let params = gen_parameters();
        let server_dh = DhKeyMaterial::generate(params, &mut rng).unwrap();
        let client_dh = DhKeyMaterial::generate(params, &mut rng).unwrap();
        let server_key = server_dh.shared_key(client_dh.public_value()).unwrap();
        let client_key = client_dh.shared_key(server_dh.public_value()).unwrap();
        assert_eq!(server_key, client_key);

        // Client → server
        let client_out = CipherPipeline::new()
            .with_layer(SubstitutionLayer::new(client_key))
            .with_layer(RsaLayer::encrypting(server.public_key()));
        let server_in = CipherPipeline::new()
            .with_layer(SubstitutionLayer::new(server_key))
            .with_layer(RsaLayer::decrypting(server.private_key()));

        let wire = client_out.encode(b"Hello relay").unwrap();
        assert_eq!(server_in.decode(&wire).unwrap(), b"Hello relay");

        // Server → client
        let server_out = CipherPipeline::new()
            .with_layer(SubstitutionLayer::new(server_key))
            .with_layer(RsaLayer::encrypting(client.public_key()));
        let client_in = CipherPipeline::new()
            .with_layer(SubstitutionLayer::new(client_key))
            .with_layer(RsaLayer::decrypting(client.private_key()));

        let wire = server_out.encode(b"Hello client").unwrap();
        assert_eq!(client_in.decode(&wire).unwrap(), b"Hello client");
    }
}
