//! Primality
//!
//! Trial-division primality test and random prime selection used to seed
//! RSA keypairs at process startup.

use rand::Rng;

use crate::errors::{CoreError, CoreResult};

/// Check primality by 6k±1 trial division up to √n
pub fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let mut i: u64 = 5;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Ensure `n` is prime
pub fn require_prime(n: u64) -> CoreResult<u64> {
    if is_prime(n) {
        Ok(n)
    } else {
        Err(CoreError::NotPrime(n))
    }
}

/// All primes in `[min, max]`
pub fn primes_in_range(min: u64, max: u64) -> Vec<u64> {
    if min > max {
        return Vec::new();
    }
    (min..=max).filter(|&n| is_prime(n)).collect()
}

/// Draw a uniformly random prime from `[min, max]`
///
/// Candidates are drawn uniformly from the range until one is prime.
///
/// # Errors
/// [`CoreError::InvalidRange`] if the range is inverted or holds no prime.
pub fn random_prime<R: Rng + ?Sized>(min: u64, max: u64, rng: &mut R) -> CoreResult<u64> {
    if min > max || !(min..=max).any(is_prime) {
        return Err(CoreError::InvalidRange { min, max });
    }

    loop {
        let candidate = rng.gen_range(min..=max);
        if is_prime(candidate) {
            return Ok(candidate);
        }
    }
}

/// Draw two distinct random primes from `[min, max]`
///
/// # Errors
/// [`CoreError::InvalidRange`] if the range holds fewer than two primes.
pub fn random_prime_pair<R: Rng + ?Sized>(min: u64, max: u64, rng: &mut R) -> CoreResult<(u64, u64)> {
    if primes_in_range(min, max).len() < 2 {
        return Err(CoreError::InvalidRange { min, max });
    }

    let p = random_prime(min, max, rng)?;
    loop {
        let q = random_prime(min, max, rng)?;
        if q != p {
            return Ok((p, q));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime_small() {
        let primes: Vec<u64> = (0..50).filter(|&n| is_prime(n)).collect();
        assert_eq!(
            primes,
            vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]
        );
    }

    #[test]
    fn test_is_prime_squares_of_primes() {
        assert!(!is_prime(25));
        assert!(!is_prime(49));
        assert!(!is_prime(3233));
        assert!(is_prime(61));
        assert!(is_prime(53));
    }

    #[test]
    fn test_require_prime() {
        assert_eq!(require_prime(97), Ok(97));
        assert_eq!(require_prime(91), Err(CoreError::NotPrime(91)));
    }

    #[test]
    fn test_random_prime_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let p = random_prime(17, 97, &mut rng).unwrap();
            assert!((17..=97).contains(&p));
            assert!(is_prime(p));
        }
    }

    #[test]
    fn test_random_prime_empty_range() {
        let mut rng = rand::thread_rng();
        assert_eq!(
            random_prime(24, 28, &mut rng),
            Err(CoreError::InvalidRange { min: 24, max: 28 })
        );
        assert!(random_prime(10, 2, &mut rng).is_err());
    }

    #[test]
    fn test_random_prime_pair_distinct() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let (p, q) = random_prime_pair(17, 31, &mut rng).unwrap();
            assert_ne!(p, q);
        }
        assert!(random_prime_pair(23, 28, &mut rng).is_err());
    }
}
