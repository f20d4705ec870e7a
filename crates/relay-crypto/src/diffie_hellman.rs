//! Finite-Field Diffie-Hellman
//!
//! Per-connection shared-secret negotiation over a small prime field. The
//! server picks `(p, g)` from a fixed table, both endpoints draw a private
//! exponent and swap `g^x mod p`, and each side raises the counterpart's
//! value to its own exponent to arrive at the same integer.

use rand::Rng;
use relay_core::prelude::*;

use crate::errors::{CryptoError, CryptoResult};

/// Known-good `(prime, generator)` pairs the server chooses from
pub const DH_PARAMETER_TABLE: [DhParameters; 7] = [
    DhParameters { modulus: 23, generator: 2 },
    DhParameters { modulus: 47, generator: 5 },
    DhParameters { modulus: 17, generator: 3 },
    DhParameters { modulus: 29, generator: 2 },
    DhParameters { modulus: 31, generator: 5 },
    DhParameters { modulus: 19, generator: 3 },
    DhParameters { modulus: 37, generator: 2 },
];

/// Field modulus p and generator g, announced as `"<p>,<g>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DhParameters {
    modulus: u64,
    generator: u64,
}

impl DhParameters {
    /// Validate parameters received from a peer
    ///
    /// `p` must be a prime above 3 (so `[1, p-1)` holds more than one
    /// exponent) and `g` must lie in `[2, p)`.
    pub fn new(modulus: u64, generator: u64) -> CryptoResult<Self> {
        if modulus <= 3 || !is_prime(modulus) {
            return Err(CryptoError::InvalidParameters(format!(
                "modulus {} is not a prime above 3",
                modulus
            )));
        }
        if generator < 2 || generator >= modulus {
            return Err(CryptoError::InvalidParameters(format!(
                "generator {} outside [2, {})",
                generator, modulus
            )));
        }
        Ok(Self { modulus, generator })
    }

    /// Accept only an entry of [`DH_PARAMETER_TABLE`]
    ///
    /// Public values are computed by repeated multiplication, so a peer
    /// announcing a large prime could stall this endpoint for hours.
    pub fn from_table(modulus: u64, generator: u64) -> CryptoResult<Self> {
        let params = Self::new(modulus, generator)?;
        if !DH_PARAMETER_TABLE.contains(&params) {
            return Err(CryptoError::InvalidParameters(format!(
                "({}, {}) is not a known parameter pair",
                modulus, generator
            )));
        }
        Ok(params)
    }

    /// Pick uniformly from [`DH_PARAMETER_TABLE`]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        DH_PARAMETER_TABLE[rng.gen_range(0..DH_PARAMETER_TABLE.len())]
    }

    /// Prime modulus p
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Generator g
    pub fn generator(&self) -> u64 {
        self.generator
    }
}

/// Pick DH parameters for a new connection using the thread RNG
pub fn gen_parameters() -> DhParameters {
    DhParameters::random(&mut rand::thread_rng())
}

/// Uniform private exponent in `[1, p-1)`
///
/// # Errors
/// [`CryptoError::InvalidParameters`] if `p <= 2`, where the range is empty.
pub fn gen_private_exponent<R: Rng + ?Sized>(p: u64, rng: &mut R) -> CryptoResult<u64> {
    if p <= 2 {
        return Err(CryptoError::InvalidParameters(format!(
            "no private exponent in [1, {})",
            p.saturating_sub(1)
        )));
    }
    Ok(rng.gen_range(1..p - 1))
}

/// `g^private mod p` by repeated multiplication
///
/// Agrees with [`mod_pow`] for every input; exponents here stay below `p`.
pub fn compute_public_value(g: u64, p: u64, private_exponent: u64) -> CryptoResult<u64> {
    Ok(mod_pow_naive(g, private_exponent, p)?)
}

/// `other_public^own_private mod p`
///
/// Both endpoints of a connection land on the same value:
/// `(g^a)^b ≡ (g^b)^a (mod p)`.
pub fn resolve_shared_key(other_public: u64, own_private: u64, p: u64) -> CryptoResult<u64> {
    Ok(mod_pow(other_public, own_private, p)?)
}

/// One endpoint's DH key material for one connection
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DhKeyMaterial {
    params: DhParameters,
    private_exponent: u64,
    public_value: u64,
}

impl DhKeyMaterial {
    /// Draw a fresh private exponent and derive its public value
    pub fn generate<R: Rng + ?Sized>(params: DhParameters, rng: &mut R) -> CryptoResult<Self> {
        let private_exponent = gen_private_exponent(params.modulus, rng)?;
        Self::from_private(params, private_exponent)
    }

    /// Rebuild material from a known private exponent in `[1, p-1)`
    pub fn from_private(params: DhParameters, private_exponent: u64) -> CryptoResult<Self> {
        if private_exponent == 0 || private_exponent >= params.modulus - 1 {
            return Err(CryptoError::InvalidParameters(format!(
                "private exponent outside [1, {})",
                params.modulus - 1
            )));
        }
        let public_value = compute_public_value(params.generator, params.modulus, private_exponent)?;
        Ok(Self {
            params,
            private_exponent,
            public_value,
        })
    }

    pub fn params(&self) -> DhParameters {
        self.params
    }

    pub fn public_value(&self) -> u64 {
        self.public_value
    }

    pub fn private_exponent(&self) -> u64 {
        self.private_exponent
    }

    /// Shared secret with the holder of `other_public`
    pub fn shared_key(&self, other_public: u64) -> CryptoResult<u64> {
        resolve_shared_key(other_public, self.private_exponent, self.params.modulus)
    }
}

impl std::fmt::Debug for DhKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyMaterial")
            .field("params", &self.params)
            .field("public_value", &self.public_value)
            .field("private_exponent", &"[REDACTED]")
            .finish()
    }
}
