//! # 512-bit Xorshift Generator
//!
//! The randomness source behind prime searches, Miller-Rabin bases, private
//! exponents and nonces. It is a plain xorshift over a 512-bit word:
//!
//! ```text
//! x ^= (x << 13) & mask
//! x ^= x >> 17
//! x ^= (x << 5)  & mask
//! ```
//!
//! This is NOT a CSPRNG. It is fast, reproducible from a seed, and that is
//! all it promises. Every component that needs randomness takes a
//! `&mut Xorshift512` explicitly, so a test can pin the seed and get the same
//! primes, keys and signatures on every run.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::config::{PRNG_STATE_BITS, PRNG_ZERO_SEED_REPLACEMENT};

/// Xorshift generator over a 512-bit state.
#[derive(Debug, Clone)]
pub struct Xorshift512 {
    state: BigUint,
    mask: BigUint,
}

impl Xorshift512 {
    /// Seed the generator. Bits above 512 are dropped; a zero seed (the one
    /// fixed point of xorshift) is replaced by a fixed non-zero constant.
    pub fn from_seed(seed: BigUint) -> Self {
        let mask = (BigUint::one() << PRNG_STATE_BITS) - 1u32;
        let mut state = seed & &mask;
        if state.is_zero() {
            state = BigUint::from(PRNG_ZERO_SEED_REPLACEMENT);
        }
        Self { state, mask }
    }

    /// Convenience seeding from a single word. Handy in tests.
    pub fn from_u64(seed: u64) -> Self {
        Self::from_seed(BigUint::from(seed))
    }

    /// Seed from operating-system entropy.
    pub fn from_entropy() -> Self {
        let mut seed = [0u8; (PRNG_STATE_BITS / 8) as usize];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self::from_seed(BigUint::from_bytes_be(&seed))
    }

    /// Advance the state and return it.
    pub fn next(&mut self) -> BigUint {
        let mut x = self.state.clone();
        let shifted = (&x << 13u32) & &self.mask;
        x ^= shifted;
        let shifted = &x >> 17u32;
        x ^= shifted;
        let shifted = (&x << 5u32) & &self.mask;
        x ^= shifted;
        self.state = x.clone();
        x
    }

    /// Draw `bits` random bits (taken from the top of one or more states).
    pub fn next_bits(&mut self, bits: u64) -> BigUint {
        let mut acc = BigUint::zero();
        let mut remaining = bits;
        while remaining > 0 {
            let take = remaining.min(PRNG_STATE_BITS);
            acc = (acc << take) | (self.next() >> (PRNG_STATE_BITS - take));
            remaining -= take;
        }
        acc
    }

    /// Uniform-ish draw from the inclusive range `[low, high]`.
    ///
    /// Draws 64 bits more than the span needs and reduces, which keeps the
    /// modulo bias far below anything a test could observe. If `high < low`
    /// the range collapses to `low`.
    pub fn gen_range(&mut self, low: &BigUint, high: &BigUint) -> BigUint {
        if high <= low {
            return low.clone();
        }
        let span = high - low + 1u32;
        let draw = self.next_bits(span.bits() + 64);
        low + draw % span
    }

    /// Fill a fresh buffer with `len` random bytes.
    pub fn next_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let word = self.next().to_bytes_be();
            let missing = len - out.len();
            out.extend(word.iter().take(missing));
        }
        out
    }
}
