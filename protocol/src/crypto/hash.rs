//! # Sponge Hash
//!
//! The digest behind block hashes, proof-of-work and signatures. It is a
//! sponge whose only mixing step is a keyed *bit permutation*:
//!
//! 1. Append the seed string to the message, then pad with zero bytes up to
//!    the next multiple of the rate. An input that is already aligned gains
//!    one full zero block, so the padding is never empty.
//! 2. Start from a state of `2 * hash_length_bytes` bytes. The first half
//!    (the rate) holds the bitrate as a big-endian integer, the second half
//!    (the capacity) is zero.
//! 3. Absorb: XOR each block into the rate, then permute the whole state.
//! 4. Squeeze: permute `squeeze_iterations` more times and output the first
//!    `hash_length_bytes` bytes.
//!
//! ## The permutation
//!
//! The state bytes key an RC4 schedule with one entry per state bit. Output
//! bit `i` is input bit `perm[i]`, bits numbered MSB-first within each byte.
//! Because the state is the key, flipping a single input bit reshuffles the
//! whole state.
//!
//! This is a toy. A bit permutation preserves Hamming weight, so it leaks
//! structure no real hash would. It is deterministic and sensitive to every
//! input bit, which is what the ledger needs from it.

use std::num::NonZeroUsize;

use num_bigint::BigUint;

use super::rc4::Rc4;
use crate::config::{HASH_LENGTH_BYTES, SPONGE_SEED, SQUEEZE_ITERATIONS};

const DEFAULT_LENGTH: NonZeroUsize = match NonZeroUsize::new(HASH_LENGTH_BYTES) {
    Some(length) => length,
    None => panic!("HASH_LENGTH_BYTES must be non-zero"),
};

/// Sponge hash parameters. `Default` is the configuration the ledger and
/// the signature schemes use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpongeHash {
    hash_length_bytes: NonZeroUsize,
    squeeze_iterations: usize,
    seed: Vec<u8>,
}

impl Default for SpongeHash {
    fn default() -> Self {
        Self {
            hash_length_bytes: DEFAULT_LENGTH,
            squeeze_iterations: SQUEEZE_ITERATIONS,
            seed: SPONGE_SEED.to_vec(),
        }
    }
}

impl SpongeHash {
    /// Sponge with a custom digest length and the default seed and squeeze.
    pub fn new(hash_length_bytes: NonZeroUsize) -> Self {
        Self {
            hash_length_bytes,
            ..Self::default()
        }
    }

    pub fn with_squeeze_iterations(mut self, squeeze_iterations: usize) -> Self {
        self.squeeze_iterations = squeeze_iterations;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<Vec<u8>>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn hash_length_bytes(&self) -> usize {
        self.hash_length_bytes.get()
    }

    /// Hash `data` to `hash_length_bytes` bytes.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let rate = self.hash_length_bytes.get();

        let mut input = Vec::with_capacity(data.len() + self.seed.len() + rate);
        input.extend_from_slice(data);
        input.extend_from_slice(&self.seed);
        pad(&mut input, rate);

        let mut state = initial_state(rate);
        for block in input.chunks(rate) {
            for (s, b) in state[..rate].iter_mut().zip(block) {
                *s ^= b;
            }
            state = permute(&state);
        }
        for _ in 0..self.squeeze_iterations {
            state = permute(&state);
        }

        state.truncate(rate);
        state
    }

    pub fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }

    /// The digest read as a little-endian integer. This is the `H(m)` the
    /// signature schemes exponentiate.
    pub fn digest_integer(&self, data: &[u8]) -> BigUint {
        BigUint::from_bytes_le(&self.digest(data))
    }
}

/// Default 32-byte sponge digest.
pub fn sponge_hash(data: &[u8]) -> Vec<u8> {
    SpongeHash::default().digest(data)
}

/// Default sponge digest as lowercase hex.
pub fn sponge_hash_hex(data: &[u8]) -> String {
    SpongeHash::default().digest_hex(data)
}

/// Zero-pad up to the next multiple of `rate`; aligned input gains a full
/// block.
fn pad(input: &mut Vec<u8>, rate: usize) {
    let padding = rate - input.len() % rate;
    input.resize(input.len() + padding, 0);
}

fn initial_state(rate: usize) -> Vec<u8> {
    let mut state = vec![0u8; 2 * rate];
    let bitrate = (8 * rate as u64).to_be_bytes();
    let width = bitrate.len().min(rate);
    state[rate - width..rate].copy_from_slice(&bitrate[bitrate.len() - width..]);
    state
}

fn bit(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] & (0x80 >> (index % 8)) != 0
}

fn permute(state: &[u8]) -> Vec<u8> {
    let Some(bit_len) = NonZeroUsize::new(state.len() * 8) else {
        return Vec::new();
    };
    let schedule = Rc4::with_state_len(state, bit_len);
    let mut out = vec![0u8; state.len()];
    for (i, &source) in schedule.permutation().iter().enumerate() {
        if bit(state, source) {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}
