//! # Number Theory Toolkit
//!
//! Arbitrary-precision primitives that every public-key component stands
//! on: modular exponentiation, extended Euclid, modular inverses,
//! Miller-Rabin, prime and safe-prime search, and generator search for the
//! multiplicative group of a safe prime.
//!
//! Arithmetic is delegated to `num-bigint`; the algorithms themselves are
//! spelled out here so their behavior (and cost) is easy to reason about.
//!
//! ## Safe primes
//!
//! A safe prime is `p = 2q + 1` with `q` prime. For such a `p` the group
//! `Z_p*` has order `2q`, so an element `alpha` generates the whole group
//! iff `alpha^2 != 1` and `alpha^q != 1`. That is exactly the test
//! [`find_generator`] runs.

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use thiserror::Error;
use tracing::{debug, info};

use super::prng::Xorshift512;
use crate::config::{MILLER_RABIN_ITERATIONS, PRNG_STATE_BITS, SAFE_PRIME_BITS, SMALL_PRIMES};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberTheoryError {
    #[error("prime search gave up after {attempts} candidates")]
    SearchExhausted { attempts: u64 },

    #[error("cannot search for {bits}-bit primes (supported range is 3..={max})")]
    InvalidBitLength { bits: u64, max: u64 },
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Square-and-multiply `a^b mod m`.
///
/// A modulus of 0 or 1 yields 0: there is no meaningful residue to return.
pub fn fast_exponentiation(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    if m.is_zero() || m.is_one() {
        return BigUint::zero();
    }

    let mut result = BigUint::one();
    let mut base = a % m;
    for bit in 0..b.bits() {
        if b.bit(bit) {
            result = result * &base % m;
        }
        base = &base * &base % m;
    }
    result
}

/// Extended Euclid. Returns `(g, x, y)` with `a*x + b*y = g = gcd(a, b)`.
///
/// The gcd is always reported non-negative.
pub fn pgcd_bezout(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let q = &old_r / &r;

        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    if old_r.sign() == Sign::Minus {
        (-old_r, -old_s, -old_t)
    } else {
        (old_r, old_s, old_t)
    }
}

/// Inverse of `a` modulo `m`, normalized into `[0, m)`.
///
/// `None` when `gcd(a, m) != 1` or `m` is zero.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    if m.is_zero() {
        return None;
    }
    let modulus = BigInt::from(m.clone());
    let (g, x, _) = pgcd_bezout(&BigInt::from(a % m), &modulus);
    if !g.is_one() {
        return None;
    }
    x.mod_floor(&modulus).to_biguint()
}

// ---------------------------------------------------------------------------
// Primality
// ---------------------------------------------------------------------------

/// Probabilistic primality test with random bases drawn from `rng`.
///
/// A composite survives one round with probability at most 1/4.
pub fn rabin_miller_test(n: &BigUint, iterations: usize, rng: &mut Xorshift512) -> bool {
    let two = BigUint::from(2u32);
    if *n < two {
        return false;
    }
    if *n == two || *n == BigUint::from(3u32) {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    let high = n - 2u32;

    'witness: for _ in 0..iterations {
        let a = rng.gen_range(&two, &high);
        let mut x = fast_exponentiation(&a, &d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_one {
                continue 'witness;
            }
            if x.is_one() {
                return false;
            }
        }
        return false;
    }
    true
}

/// Cheap filter against the small primes in [`SMALL_PRIMES`].
///
/// Returns `false` if `n` has a small prime factor other than itself.
/// Evenness is not checked; callers only ever hand in odd candidates.
pub fn passes_trial_division(n: &BigUint) -> bool {
    for &p in SMALL_PRIMES.iter() {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }
    true
}

fn is_probable_prime(n: &BigUint, rng: &mut Xorshift512) -> bool {
    passes_trial_division(n) && rabin_miller_test(n, MILLER_RABIN_ITERATIONS, rng)
}

// ---------------------------------------------------------------------------
// Prime Search
// ---------------------------------------------------------------------------

/// Draw an odd starting point with exactly `bits` significant bits.
fn odd_candidate(bits: u64, rng: &mut Xorshift512) -> Result<BigUint, NumberTheoryError> {
    if !(3..=PRNG_STATE_BITS).contains(&bits) {
        return Err(NumberTheoryError::InvalidBitLength {
            bits,
            max: PRNG_STATE_BITS,
        });
    }
    loop {
        let mut candidate = rng.next_bits(bits);
        if candidate.bits() != bits {
            continue;
        }
        if candidate.is_even() {
            candidate += 1u32;
        }
        return Ok(candidate);
    }
}

/// Walk odd candidates from a random start until `accept` says yes or the
/// attempt budget runs out. Walking past the bit length restarts the walk.
fn search<F>(
    bits: u64,
    rng: &mut Xorshift512,
    max_attempts: Option<u64>,
    mut accept: F,
) -> Result<BigUint, NumberTheoryError>
where
    F: FnMut(&BigUint, &mut Xorshift512) -> bool,
{
    let mut candidate = odd_candidate(bits, rng)?;
    let mut attempts = 0u64;
    loop {
        if max_attempts.is_some_and(|limit| attempts >= limit) {
            debug!(bits, attempts, "prime search budget spent");
            return Err(NumberTheoryError::SearchExhausted { attempts });
        }
        attempts += 1;
        if accept(&candidate, rng) {
            debug!(bits, attempts, "prime search hit");
            return Ok(candidate);
        }
        candidate += 2u32;
        if candidate.bits() > bits {
            candidate = odd_candidate(bits, rng)?;
        }
    }
}

/// Find a probable prime of `bits` bits (between 3 and 512).
pub fn find_prime(
    bits: u64,
    rng: &mut Xorshift512,
    max_attempts: Option<u64>,
) -> Result<BigUint, NumberTheoryError> {
    search(bits, rng, max_attempts, is_probable_prime)
}

/// Find a safe prime `p = 2q + 1` of `bits` bits where both `p` and `q`
/// pass trial division and Miller-Rabin.
pub fn find_safe_prime(
    bits: u64,
    rng: &mut Xorshift512,
    max_attempts: Option<u64>,
) -> Result<BigUint, NumberTheoryError> {
    search(bits, rng, max_attempts, |p, rng| {
        let q: BigUint = p >> 1u32;
        passes_trial_division(p)
            && passes_trial_division(&q)
            && rabin_miller_test(p, MILLER_RABIN_ITERATIONS, rng)
            && rabin_miller_test(&q, MILLER_RABIN_ITERATIONS, rng)
    })
}

/// The group size everything else in the toolkit is tuned for.
///
/// Expect this to take a while: a typical search walks through tens of
/// thousands of odd candidates.
pub fn find_safe_512_bits_prime(
    rng: &mut Xorshift512,
    max_attempts: Option<u64>,
) -> Result<BigUint, NumberTheoryError> {
    let p = find_safe_prime(SAFE_PRIME_BITS, rng, max_attempts)?;
    info!(bits = SAFE_PRIME_BITS, "found safe prime");
    Ok(p)
}

/// Smallest generator of `Z_p*` for a safe prime `p`.
///
/// Walks `alpha = 2, 3, ...` and rejects elements of order 2 or `q`.
/// Returns `None` if `p` is too small to have a candidate below `p - 1`.
pub fn find_generator(p: &BigUint) -> Option<BigUint> {
    if *p < BigUint::from(5u32) {
        return None;
    }
    let p_minus_one = p - 1u32;
    let q: BigUint = &p_minus_one >> 1u32;
    let two = BigUint::from(2u32);

    let mut alpha = two.clone();
    while alpha < p_minus_one {
        let order_two = fast_exponentiation(&alpha, &two, p).is_one();
        if !order_two && !fast_exponentiation(&alpha, &q, p).is_one() {
            return Some(alpha);
        }
        alpha += 1u32;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn fast_exponentiation_small_values() {
        assert_eq!(fast_exponentiation(&big(4), &big(13), &big(497)), big(445));
        assert_eq!(fast_exponentiation(&big(2), &big(10), &big(1000)), big(24));
        assert_eq!(fast_exponentiation(&big(7), &big(0), &big(13)), big(1));
        assert_eq!(fast_exponentiation(&big(0), &big(5), &big(13)), big(0));
    }

    #[test]
    fn fast_exponentiation_degenerate_modulus() {
        assert_eq!(fast_exponentiation(&big(5), &big(3), &big(1)), big(0));
        assert_eq!(fast_exponentiation(&big(5), &big(3), &big(0)), big(0));
    }

    #[test]
    fn fast_exponentiation_agrees_with_modpow() {
        let mut rng = Xorshift512::from_u64(11);
        for _ in 0..20 {
            let a = rng.next_bits(200);
            let b = rng.next_bits(150);
            let m = rng.next_bits(180) + 2u32;
            assert_eq!(fast_exponentiation(&a, &b, &m), a.modpow(&b, &m));
        }
    }

    #[test]
    fn bezout_identity_holds() {
        let cases = [(240i64, 46i64), (17, 5), (5, 17), (0, 9), (9, 0), (12, 12)];
        for (a, b) in cases {
            let (a, b) = (BigInt::from(a), BigInt::from(b));
            let (g, x, y) = pgcd_bezout(&a, &b);
            assert_eq!(&a * &x + &b * &y, g);
            assert_eq!(g, a.gcd(&b));
        }
    }

    #[test]
    fn bezout_of_240_and_46() {
        let (g, x, y) = pgcd_bezout(&BigInt::from(240), &BigInt::from(46));
        assert_eq!(g, BigInt::from(2));
        assert_eq!(x, BigInt::from(-9));
        assert_eq!(y, BigInt::from(47));
    }

    #[test]
    fn mod_inverse_normalizes() {
        assert_eq!(mod_inverse(&big(3), &big(11)), Some(big(4)));
        assert_eq!(mod_inverse(&big(10), &big(17)), Some(big(12)));
        // 240 * x = 1 mod 47 where 240 = 5 mod 47, 5 * 19 = 95 = 1 mod 47
        assert_eq!(mod_inverse(&big(240), &big(47)), Some(big(19)));
    }

    #[test]
    fn mod_inverse_requires_coprime() {
        assert_eq!(mod_inverse(&big(6), &big(9)), None);
        assert_eq!(mod_inverse(&big(3), &big(0)), None);
    }

    #[test]
    fn miller_rabin_known_values() {
        let mut rng = Xorshift512::from_u64(1);
        for p in [2u64, 3, 5, 7, 13, 97, 7919, 104_729, 2_147_483_647] {
            assert!(rabin_miller_test(&big(p), 5, &mut rng), "{p} is prime");
        }
        for c in [0u64, 1, 4, 9, 15, 561, 1105, 7917, 104_730] {
            assert!(!rabin_miller_test(&big(c), 5, &mut rng), "{c} is composite");
        }
    }

    #[test]
    fn miller_rabin_mersenne_127() {
        let mut rng = Xorshift512::from_u64(2);
        let m127 = (BigUint::one() << 127u32) - 1u32;
        assert!(rabin_miller_test(&m127, 5, &mut rng));
        assert!(!rabin_miller_test(&(m127 + 2u32), 5, &mut rng));
    }

    #[test]
    fn trial_division_lets_small_primes_through() {
        assert!(passes_trial_division(&big(3)));
        assert!(passes_trial_division(&big(101)));
        assert!(passes_trial_division(&big(103)));
        assert!(!passes_trial_division(&big(105)));
        assert!(!passes_trial_division(&big(7 * 103)));
    }

    #[test]
    fn find_prime_has_requested_size() {
        let mut rng = Xorshift512::from_u64(42);
        for bits in [8u64, 32, 64, 128] {
            let p = find_prime(bits, &mut rng, Some(100_000)).unwrap();
            assert_eq!(p.bits(), bits);
            assert!(rabin_miller_test(&p, 10, &mut rng));
        }
    }

    #[test]
    fn find_safe_prime_small() {
        let mut rng = Xorshift512::from_u64(7);
        let p = find_safe_prime(32, &mut rng, Some(1_000_000)).unwrap();
        let q: BigUint = (&p - 1u32) >> 1u32;
        assert_eq!(p.bits(), 32);
        assert!(rabin_miller_test(&p, 10, &mut rng));
        assert!(rabin_miller_test(&q, 10, &mut rng));
    }

    #[test]
    fn search_budget_is_respected() {
        let mut rng = Xorshift512::from_u64(3);
        let err = find_safe_prime(256, &mut rng, Some(1)).unwrap_err();
        assert!(matches!(err, NumberTheoryError::SearchExhausted { attempts: 1 }));
    }

    #[test]
    fn zero_budget_fails_immediately() {
        let mut rng = Xorshift512::from_u64(3);
        assert_eq!(
            find_prime(16, &mut rng, Some(0)),
            Err(NumberTheoryError::SearchExhausted { attempts: 0 })
        );
    }

    #[test]
    fn bit_length_is_validated() {
        let mut rng = Xorshift512::from_u64(3);
        assert!(matches!(
            find_prime(2, &mut rng, None),
            Err(NumberTheoryError::InvalidBitLength { bits: 2, .. })
        ));
        assert!(matches!(
            find_prime(513, &mut rng, None),
            Err(NumberTheoryError::InvalidBitLength { bits: 513, .. })
        ));
    }

    #[test]
    fn generator_of_small_safe_primes() {
        // 23 = 2*11 + 1: 2 has order 11, 3 has order 11, 4 has order 11,
        // 5 is the first full generator.
        assert_eq!(find_generator(&big(23)), Some(big(5)));
        // 11 = 2*5 + 1: 2 generates.
        assert_eq!(find_generator(&big(11)), Some(big(2)));
        // 7 = 2*3 + 1: 2 has order 3, 3 generates.
        assert_eq!(find_generator(&big(7)), Some(big(3)));
    }

    #[test]
    fn generator_generates_the_whole_group() {
        let p = big(23);
        let alpha = find_generator(&p).unwrap();
        let mut seen = std::collections::HashSet::new();
        for e in 1..23u64 {
            seen.insert(fast_exponentiation(&alpha, &big(e), &p));
        }
        assert_eq!(seen.len(), 22);
    }

    #[test]
    fn generator_needs_a_real_group() {
        assert_eq!(find_generator(&big(3)), None);
        assert_eq!(find_generator(&big(0)), None);
    }
}
