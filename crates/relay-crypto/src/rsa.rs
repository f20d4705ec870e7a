//! Small-Integer RSA
//!
//! Textbook RSA over a modulus built from two small primes. Messages are
//! encrypted one byte at a time: every input byte becomes one integer on
//! the wire, written as space-separated decimal text.

use rand::Rng;
use relay_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{CryptoError, CryptoResult};

/// Largest byte value plus one; decrypted integers are reduced by this
pub const BYTE_RANGE: u64 = 256;

/// Public half of an RSA keypair, announced as `"<e>,<n>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RsaPublicKey {
    /// Public exponent e
    pub exponent: u64,
    /// Modulus n
    pub modulus: u64,
}

impl RsaPublicKey {
    pub fn new(exponent: u64, modulus: u64) -> Self {
        Self { exponent, modulus }
    }

    /// Encrypt a single integer
    pub fn encrypt_int(&self, m: u64) -> CryptoResult<u64> {
        encrypt_int(m, self.exponent, self.modulus)
    }

    /// Encrypt every byte of `bytes` into its own integer
    pub fn encrypt_bytes(&self, bytes: &[u8]) -> CryptoResult<Vec<u64>> {
        bytes.iter().map(|&b| self.encrypt_int(b as u64)).collect()
    }
}

impl std::fmt::Display for RsaPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.exponent, self.modulus)
    }
}

/// Private half of an RSA keypair
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RsaPrivateKey {
    exponent: u64,
    modulus: u64,
}

impl RsaPrivateKey {
    pub fn new(exponent: u64, modulus: u64) -> Self {
        Self { exponent, modulus }
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Decrypt a single integer back into a byte
    pub fn decrypt_int(&self, c: u64) -> CryptoResult<u8> {
        decrypt_int(c, self.exponent, self.modulus)
    }

    /// Decrypt a sequence of integers into bytes
    pub fn decrypt_ints(&self, ints: &[u64]) -> CryptoResult<Vec<u8>> {
        ints.iter().map(|&c| self.decrypt_int(c)).collect()
    }
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("modulus", &self.modulus)
            .field("exponent", &"[REDACTED]")
            .finish()
    }
}

/// RSA keypair: modulus n = p·q, public exponent e, private exponent d
///
/// Created once per process at startup and immutable afterwards.
#[derive(Clone)]
pub struct RsaKeyPair {
    public: RsaPublicKey,
    private_exponent: u64,
}

impl RsaKeyPair {
    /// Generate a keypair from two primes
    ///
    /// Picks the smallest `e >= 2` coprime to φ(n) = (p-1)(q-1) and
    /// `d = e⁻¹ mod φ(n)`.
    ///
    /// # Errors
    /// * [`CoreError::NotPrime`] if `p` or `q` is composite
    /// * [`CryptoError::DuplicatePrimes`] if `p == q`
    /// * [`CryptoError::ModulusTooSmall`] if `n <= 255`
    /// * [`CryptoError::KeyGenerationFailed`] if no exponent exists
    pub fn generate(p: u64, q: u64) -> CryptoResult<Self> {
        require_prime(p)?;
        require_prime(q)?;
        if p == q {
            return Err(CryptoError::DuplicatePrimes);
        }

        let n = p
            .checked_mul(q)
            .ok_or_else(|| CryptoError::KeyGenerationFailed(format!("{} * {} overflows", p, q)))?;
        if n < BYTE_RANGE {
            return Err(CryptoError::ModulusTooSmall { modulus: n });
        }

        let phi = (p - 1) * (q - 1);
        let e = (2..phi).find(|&e| gcd(e, phi) == 1).ok_or_else(|| {
            CryptoError::KeyGenerationFailed(format!("no public exponent coprime to {}", phi))
        })?;
        let d = mod_inverse(e, phi)?;

        Ok(Self {
            public: RsaPublicKey::new(e, n),
            private_exponent: d,
        })
    }

    /// Generate a keypair from two distinct random primes in `[min, max]`
    ///
    /// Pairs whose modulus falls inside the byte range are redrawn.
    pub fn generate_random<R: Rng + ?Sized>(min: u64, max: u64, rng: &mut R) -> CryptoResult<Self> {
        if !range_supports_keys(min, max) {
            return Err(CryptoError::InvalidParameters(format!(
                "no two distinct primes in [{}, {}] give a modulus of at least {}",
                min, max, BYTE_RANGE
            )));
        }

        loop {
            let (p, q) = random_prime_pair(min, max, rng)?;
            if p.saturating_mul(q) >= BYTE_RANGE {
                return Self::generate(p, q);
            }
        }
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.public
    }

    pub fn private_key(&self) -> RsaPrivateKey {
        RsaPrivateKey::new(self.private_exponent, self.public.modulus)
    }

    pub fn modulus(&self) -> u64 {
        self.public.modulus
    }

    pub fn public_exponent(&self) -> u64 {
        self.public.exponent
    }

    pub fn private_exponent(&self) -> u64 {
        self.private_exponent
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public", &self.public)
            .field("private_exponent", &"[REDACTED]")
            .finish()
    }
}

/// Largest modulus two distinct primes from `[min, max]` can produce
pub fn largest_modulus_in_range(min: u64, max: u64) -> Option<u64> {
    match primes_in_range(min, max).as_slice() {
        [.., p, q] => Some(p.saturating_mul(*q)),
        _ => None,
    }
}

/// Whether `[min, max]` holds two distinct primes whose product covers the
/// byte range
pub fn range_supports_keys(min: u64, max: u64) -> bool {
    largest_modulus_in_range(min, max).map_or(false, |n| n >= BYTE_RANGE)
}

/// `(m mod n)^e mod n`
pub fn encrypt_int(m: u64, e: u64, n: u64) -> CryptoResult<u64> {
    if n == 0 {
        return Err(CoreError::ZeroModulus.into());
    }
    Ok(mod_pow(m % n, e, n)?)
}

/// `(c^d mod n) mod 256`
///
/// The final reduction is mandatory: n exceeds the byte range, so the raw
/// residue is not guaranteed to be a byte.
pub fn decrypt_int(c: u64, d: u64, n: u64) -> CryptoResult<u8> {
    Ok((mod_pow(c, d, n)? % BYTE_RANGE) as u8)
}

/// Render integers as wire text: each value followed by a single space
pub fn format_ciphertext(ints: &[u64]) -> String {
    let mut out = String::with_capacity(ints.len() * 5);
    for value in ints {
        out.push_str(&value.to_string());
        out.push(' ');
    }
    out
}

/// Parse whitespace-separated decimal integers
pub fn parse_ciphertext(text: &str) -> CryptoResult<Vec<u64>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<u64>()
                .map_err(|_| CryptoError::MalformedCiphertext(format!("not an integer: {:?}", token)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textbook_keypair() {
        let kp = RsaKeyPair::generate(61, 53).unwrap();
        assert_eq!(kp.modulus(), 3233);
        assert_eq!(kp.public_exponent(), 7);
        assert_eq!(kp.private_exponent(), 1783);
    }

    #[test]
    fn test_smallest_coprime_exponent() {
        // φ = 16 * 18 = 288, divisible by 2 and 3
        let kp = RsaKeyPair::generate(17, 19).unwrap();
        assert_eq!(kp.public_exponent(), 5);
        assert_eq!(kp.public_exponent() * kp.private_exponent() % 288, 1);
    }

    #[test]
    fn test_byte_roundtrip_all_prime_pairs() {
        let primes = primes_in_range(17, 97);
        for (i, &p) in primes.iter().enumerate() {
            for &q in &primes[i + 1..] {
                let kp = RsaKeyPair::generate(p, q).unwrap();
                let public = kp.public_key();
                let private = kp.private_key();
                for m in 0..=255u64 {
                    let c = public.encrypt_int(m).unwrap();
                    assert_eq!(private.decrypt_int(c).unwrap() as u64, m, "p={} q={} m={}", p, q, m);
                }
            }
        }
    }

    #[test]
    fn test_generate_rejects_composites() {
        assert_eq!(
            RsaKeyPair::generate(60, 53).unwrap_err(),
            CryptoError::Core(CoreError::NotPrime(60))
        );
    }

    #[test]
    fn test_generate_rejects_duplicates_and_small_modulus() {
        assert_eq!(RsaKeyPair::generate(61, 61).unwrap_err(), CryptoError::DuplicatePrimes);
        assert_eq!(
            RsaKeyPair::generate(3, 5).unwrap_err(),
            CryptoError::ModulusTooSmall { modulus: 15 }
        );
    }

    #[test]
    fn test_generate_random() {
        let mut rng = rand::thread_rng();
        let kp = RsaKeyPair::generate_random(17, 97, &mut rng).unwrap();
        assert!(kp.modulus() > 255);

        // Only 17 * 19 clears the byte range here
        for _ in 0..20 {
            let kp = RsaKeyPair::generate_random(2, 19, &mut rng).unwrap();
            assert_eq!(kp.modulus(), 323);
        }
    }

    #[test]
    fn test_range_supports_keys() {
        assert!(range_supports_keys(17, 97));
        assert!(range_supports_keys(17, 19));
        assert!(!range_supports_keys(13, 17));
        assert!(!range_supports_keys(2, 13));
        assert!(!range_supports_keys(17, 18));
        assert!(!range_supports_keys(97, 17));
        assert!(matches!(
            RsaKeyPair::generate_random(2, 13, &mut rand::thread_rng()),
            Err(CryptoError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_largest_modulus_in_range() {
        assert_eq!(largest_modulus_in_range(17, 97), Some(89 * 97));
        assert_eq!(largest_modulus_in_range(10007, 10099), Some(10093 * 10099));
        assert_eq!(largest_modulus_in_range(17, 18), None);
    }

    #[test]
    fn test_ciphertext_text_format() {
        assert_eq!(format_ciphertext(&[123, 45, 6, 200]), "123 45 6 200 ");
        assert_eq!(parse_ciphertext("123 45 6 200 ").unwrap(), vec![123, 45, 6, 200]);
        assert_eq!(parse_ciphertext("").unwrap(), Vec::<u64>::new());
        assert!(matches!(
            parse_ciphertext("12 x3"),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_encrypt_bytes_one_int_per_byte() {
        let kp = RsaKeyPair::generate(61, 53).unwrap();
        let ints = kp.public_key().encrypt_bytes(b"hi").unwrap();
        assert_eq!(ints.len(), 2);
        assert_eq!(kp.private_key().decrypt_ints(&ints).unwrap(), b"hi");
    }

    #[test]
    fn test_private_key_debug_redacted() {
        let kp = RsaKeyPair::generate(61, 53).unwrap();
        let debug = format!("{:?}", kp);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("1783"));
    }
}
