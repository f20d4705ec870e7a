//! Modular Arithmetic
//!
//! Fixed-width modular exponentiation, inverse and gcd shared by the RSA
//! and Diffie-Hellman layers. All values are small integers; intermediate
//! products are widened to `u128` so no multiplication can overflow.

use crate::errors::{CoreError, CoreResult};

// =============================================================================
// EXPONENTIATION
// =============================================================================

/// Compute `base^exponent mod modulus` by square-and-multiply
///
/// Runs in O(log exponent) multiplications.
///
/// # Arguments
/// * `base` - Base value (reduced modulo `modulus` first)
/// * `exponent` - Non-negative exponent
/// * `modulus` - Non-zero modulus
///
/// # Returns
/// The residue in `[0, modulus)`. A modulus of 1 always yields 0 and an
/// exponent of 0 yields `1 mod modulus`.
pub fn mod_pow(base: u64, exponent: u64, modulus: u64) -> CoreResult<u64> {
    if modulus == 0 {
        return Err(CoreError::ZeroModulus);
    }

    let m = modulus as u128;
    let mut result: u128 = 1 % m;
    let mut base = base as u128 % m;
    let mut exponent = exponent;

    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result * base % m;
        }
        exponent >>= 1;
        base = base * base % m;
    }

    Ok(result as u64)
}

/// Compute `base^exponent mod modulus` by repeated multiplication
///
/// Linear in `exponent`; DH public values are computed this way, where
/// exponents stay below the two-digit table primes.
pub fn mod_pow_naive(base: u64, exponent: u64, modulus: u64) -> CoreResult<u64> {
    if modulus == 0 {
        return Err(CoreError::ZeroModulus);
    }

    let m = modulus as u128;
    let base = base as u128 % m;
    let mut result: u128 = 1 % m;
    for _ in 0..exponent {
        result = result * base % m;
    }
    Ok(result as u64)
}

// =============================================================================
// INVERSE / GCD
// =============================================================================

/// Greatest common divisor (Euclid)
///
/// `gcd(a, 0) == a`.
pub fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Find `x` in `[1, m)` with `a * x ≡ 1 (mod m)`
///
/// The search is exhaustive over `[1, m)`. That is linear in `m` and only
/// acceptable for the small moduli this system uses; it is a scaling
/// limit, not a correctness one.
///
/// # Errors
/// [`CoreError::NoInverseExists`] when no candidate satisfies the relation
/// (including `m <= 1`).
pub fn mod_inverse(a: u64, m: u64) -> CoreResult<u64> {
    if m == 0 {
        return Err(CoreError::ZeroModulus);
    }

    let wide_m = m as u128;
    let reduced = a as u128 % wide_m;

    (1..m)
        .find(|&x| reduced * x as u128 % wide_m == 1)
        .ok_or(CoreError::NoInverseExists { value: a, modulus: m })
}
