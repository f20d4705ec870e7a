//! Cipher Layer Pipeline
//!
//! A message travels through a stack of [`CipherLayer`]s: encoding applies
//! the layers in order, decoding undoes them in reverse. The relay loop is
//! written once against a pipeline and each deployment profile decides
//! which layers are stacked.
//!
//! ```text
//! plaintext ──► SubstitutionLayer ──► RsaLayer ──► "123 45 6 200 "
//! plaintext ◄── SubstitutionLayer ◄── RsaLayer ◄── "123 45 6 200 "
//! ```

use crate::errors::{CryptoError, CryptoResult};
use crate::rsa::{format_ciphertext, parse_ciphertext, RsaPrivateKey, RsaPublicKey};
use crate::substitution::SubstitutionCipher;

/// One reversible transformation of a byte message
pub trait CipherLayer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn encode(&self, input: &[u8]) -> CryptoResult<Vec<u8>>;

    fn decode(&self, input: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Substitution cipher as a layer
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionLayer {
    cipher: SubstitutionCipher,
}

impl SubstitutionLayer {
    pub fn new(key: u64) -> Self {
        Self {
            cipher: SubstitutionCipher::new(key),
        }
    }
}

impl CipherLayer for SubstitutionLayer {
    fn name(&self) -> &'static str {
        "substitution"
    }

    fn encode(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(self.cipher.encrypt(input))
    }

    fn decode(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(self.cipher.decrypt(input))
    }
}

/// Byte-granular RSA as a layer
///
/// Encoding turns each input byte into one integer under the public key and
/// renders the space-separated decimal text; decoding parses that text and
/// decrypts under the private key. A direction without its key fails with
/// [`CryptoError::MissingKey`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaLayer {
    encrypt_with: Option<RsaPublicKey>,
    decrypt_with: Option<RsaPrivateKey>,
}

impl RsaLayer {
    pub fn new(encrypt_with: RsaPublicKey, decrypt_with: RsaPrivateKey) -> Self {
        Self {
            encrypt_with: Some(encrypt_with),
            decrypt_with: Some(decrypt_with),
        }
    }

    /// Layer that can only encode
    pub fn encrypting(key: RsaPublicKey) -> Self {
        Self {
            encrypt_with: Some(key),
            decrypt_with: None,
        }
    }

    /// Layer that can only decode
    pub fn decrypting(key: RsaPrivateKey) -> Self {
        Self {
            encrypt_with: None,
            decrypt_with: Some(key),
        }
    }
}

impl CipherLayer for RsaLayer {
    fn name(&self) -> &'static str {
        "rsa"
    }

    fn encode(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = self.encrypt_with.ok_or(CryptoError::MissingKey("rsa public"))?;
        let ints = key.encrypt_bytes(input)?;
        Ok(format_ciphertext(&ints).into_bytes())
    }

    fn decode(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = self.decrypt_with.ok_or(CryptoError::MissingKey("rsa private"))?;
        let text = std::str::from_utf8(input)
            .map_err(|_| CryptoError::MalformedCiphertext("ciphertext is not ASCII".into()))?;
        key.decrypt_ints(&parse_ciphertext(text)?)
    }
}

/// Ordered stack of cipher layers
#[derive(Default)]
pub struct CipherPipeline {
    layers: Vec<Box<dyn CipherLayer>>,
}

impl CipherPipeline {
    /// Empty pipeline (identity transform)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer; it runs after the existing ones when encoding
    pub fn with_layer<L: CipherLayer + 'static>(mut self, layer: L) -> Self {
        self.push(layer);
        self
    }

    pub fn push<L: CipherLayer + 'static>(&mut self, layer: L) {
        self.layers.push(Box::new(layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn encode(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut data = input.to_vec();
        for layer in &self.layers {
            data = layer.encode(&data)?;
        }
        Ok(data)
    }

    pub fn decode(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut data = input.to_vec();
        for layer in self.layers.iter().rev() {
            data = layer.decode(&data)?;
        }
        Ok(data)
    }
}

impl std::fmt::Debug for CipherPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherPipeline")
            .field("layers", &self.layer_names())
            .finish()
    }
}
