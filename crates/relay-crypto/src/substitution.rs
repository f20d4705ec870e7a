//! Substitution Cipher
//!
//! Byte-wise alphabetic shift keyed by a DH shared secret. Letters move by
//! `key mod 26` within their own case and wrap; every other byte passes
//! through untouched. Input is processed in a single fixed-size block.

/// Size of the cipher block, terminator included
pub const BLOCK_SIZE: usize = 1024;

/// Longest message the cipher emits; longer input is truncated
pub const MAX_MESSAGE_LEN: usize = BLOCK_SIZE - 1;

const ALPHABET_LEN: u8 = 26;

/// Reduce a DH shared secret into a shift in `[0, 26)`
pub fn shift_for_key(key: u64) -> u8 {
    (key % ALPHABET_LEN as u64) as u8
}

fn shift_byte(byte: u8, shift: u8) -> u8 {
    let base = match byte {
        b'a'..=b'z' => b'a',
        b'A'..=b'Z' => b'A',
        _ => return byte,
    };
    (byte - base + shift) % ALPHABET_LEN + base
}

/// Shift cipher with a fixed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionCipher {
    shift: u8,
}

impl SubstitutionCipher {
    /// Build a cipher from a shared secret (reduced mod 26)
    pub fn new(key: u64) -> Self {
        Self {
            shift: shift_for_key(key),
        }
    }

    pub fn shift(&self) -> u8 {
        self.shift
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        truncate(plaintext)
            .iter()
            .map(|&b| shift_byte(b, self.shift))
            .collect()
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        let inverse = (ALPHABET_LEN - self.shift) % ALPHABET_LEN;
        truncate(ciphertext)
            .iter()
            .map(|&b| shift_byte(b, inverse))
            .collect()
    }
}

fn truncate(input: &[u8]) -> &[u8] {
    &input[..input.len().min(MAX_MESSAGE_LEN)]
}

/// Encrypt `plaintext` under `key`
pub fn encrypt(key: u64, plaintext: &[u8]) -> Vec<u8> {
    SubstitutionCipher::new(key).encrypt(plaintext)
}

/// Decrypt `ciphertext` under `key`
pub fn decrypt(key: u64, ciphertext: &[u8]) -> Vec<u8> {
    SubstitutionCipher::new(key).decrypt(ciphertext)
}
