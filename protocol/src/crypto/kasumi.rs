//! # Kasumi-style Block Cipher
//!
//! A 64-bit block, 128-bit key, 8-round Feistel network with the KASUMI
//! shape: every round applies an `FL` and an `FO` function to the left half,
//! in alternating order, and XORs the result into the right half.
//!
//! ```text
//! round r (0-based)      f = FO(FL(L))  if r is even
//!                        f = FL(FO(L))  if r is odd
//!                    (L, R) = (R ^ f, L)
//! ```
//!
//! Decryption runs the rounds backwards with the same `f`, so neither `FL`
//! nor `FO` ever has to be inverted.
//!
//! Where this departs from 3GPP KASUMI:
//!
//! - `FI` uses two 8-bit substitution boxes derived from RC4 instead of the
//!   7/9-bit S7/S9 tables.
//! - `FL` finishes with an inversion in GF(2^16).
//! - The session key is the low 128 bits of a Diffie-Hellman secret.
//!
//! Round subkeys are recomputed from [`KeyMaterial`] on every call and
//! never stored.

use std::fmt;

use num_bigint::BigUint;

use super::rc4::Rc4;
use crate::config::{FEISTEL_ROUNDS, GF16_POLYNOMIAL, NOTHING_UP_MY_SLEEVE, SBOX_SEED_1, SBOX_SEED_2};

// ---------------------------------------------------------------------------
// Key Material
// ---------------------------------------------------------------------------

/// The 128-bit session key and its masked twin `K' = K ^ C`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    key: u128,
    modified_key: u128,
}

impl KeyMaterial {
    pub fn from_key(key: u128) -> Self {
        Self {
            key,
            modified_key: key ^ NOTHING_UP_MY_SLEEVE,
        }
    }

    /// Keep the low 128 bits of a shared secret.
    pub fn from_secret(secret: &BigUint) -> Self {
        let mut low = [0u8; 16];
        for (dst, src) in low.iter_mut().zip(secret.to_bytes_le()) {
            *dst = src;
        }
        Self::from_key(u128::from_le_bytes(low))
    }

    /// Draw a key from an RC4 keystream.
    pub fn random(rc4: &mut Rc4) -> Self {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&rc4.next_bytes(16));
        Self::from_key(u128::from_be_bytes(bytes))
    }

    pub fn key(&self) -> u128 {
        self.key
    }

    pub fn modified_key(&self) -> u128 {
        self.modified_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Split a 128-bit key into eight 16-bit words, most significant first.
fn words(value: u128) -> [u16; 8] {
    std::array::from_fn(|i| (value >> (112 - 16 * i)) as u16)
}

/// Subkeys for a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundKeys {
    pub kl1: u16,
    pub kl2: u16,
    pub ko1: u16,
    pub ko2: u16,
    pub ko3: u16,
    pub ki1: u16,
    pub ki2: u16,
    pub ki3: u16,
}

impl RoundKeys {
    /// KASUMI key schedule for `round` (0-based). Word indices wrap mod 8.
    pub fn derive(material: &KeyMaterial, round: usize) -> Self {
        let k = words(material.key);
        let kp = words(material.modified_key);
        let at = |offset: usize| (round + offset) % 8;
        Self {
            kl1: k[at(0)].rotate_left(1),
            kl2: kp[at(2)],
            ko1: k[at(1)].rotate_left(5),
            ko2: k[at(5)].rotate_left(8),
            ko3: k[at(6)].rotate_left(13),
            ki1: kp[at(4)],
            ki2: kp[at(3)],
            ki3: kp[at(7)],
        }
    }
}

// ---------------------------------------------------------------------------
// Substitution Boxes
// ---------------------------------------------------------------------------

/// The two byte substitution tables used by `FI`.
#[derive(Clone, PartialEq, Eq)]
pub struct SBoxes {
    pub s1: [u8; 256],
    pub s2: [u8; 256],
}

impl SBoxes {
    /// Tables derived from the fixed seeds in config.
    pub fn standard() -> Self {
        Self::from_seeds(SBOX_SEED_1, SBOX_SEED_2)
    }

    /// Each table is the permutation an RC4 key schedule leaves behind.
    pub fn from_seeds(seed1: &[u8], seed2: &[u8]) -> Self {
        Self {
            s1: sbox(seed1),
            s2: sbox(seed2),
        }
    }
}

impl fmt::Debug for SBoxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SBoxes").finish_non_exhaustive()
    }
}

fn sbox(seed: &[u8]) -> [u8; 256] {
    let schedule = Rc4::new(seed);
    let mut table = [0u8; 256];
    for (slot, &value) in table.iter_mut().zip(schedule.permutation()) {
        *slot = value as u8;
    }
    table
}

// ---------------------------------------------------------------------------
// GF(2^16)
// ---------------------------------------------------------------------------

fn gf16_mul(a: u16, b: u16) -> u16 {
    let mut a = u32::from(a);
    let mut b = b;
    let mut product = 0u32;
    while b != 0 {
        if b & 1 == 1 {
            product ^= a;
        }
        b >>= 1;
        a <<= 1;
        if a & 0x1_0000 != 0 {
            a ^= GF16_POLYNOMIAL;
        }
    }
    product as u16
}

/// Multiplicative inverse via `x^(2^16 - 2)`. Zero maps to zero.
fn gf16_inverse(x: u16) -> u16 {
    if x == 0 {
        return 0;
    }
    let mut result = 1u16;
    let mut base = x;
    let mut exponent = 0xFFFEu32;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = gf16_mul(result, base);
        }
        base = gf16_mul(base, base);
        exponent >>= 1;
    }
    result
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Kasumi {
    material: KeyMaterial,
    sboxes: SBoxes,
}

impl Kasumi {
    pub fn new(material: KeyMaterial) -> Self {
        Self::with_sboxes(material, SBoxes::standard())
    }

    pub fn with_sboxes(material: KeyMaterial, sboxes: SBoxes) -> Self {
        Self { material, sboxes }
    }

    pub fn key_material(&self) -> &KeyMaterial {
        &self.material
    }

    /// 16-bit mixing function.
    pub fn fi(&self, x: u16, ki: u16) -> u16 {
        let m = x ^ ki;
        let substituted = (u16::from(self.sboxes.s1[usize::from(m >> 8)]) << 8)
            | u16::from(self.sboxes.s2[usize::from(m & 0xff)]);
        substituted ^ m.rotate_left(7)
    }

    /// Three-round Feistel over the two 16-bit halves of `x`.
    pub fn fo(&self, x: u32, keys: &RoundKeys) -> u32 {
        let mut left = (x >> 16) as u16;
        let mut right = x as u16;
        for (ko, ki) in [
            (keys.ko1, keys.ki1),
            (keys.ko2, keys.ki2),
            (keys.ko3, keys.ki3),
        ] {
            let next = self.fi(left ^ ko, ki) ^ right;
            left = right;
            right = next;
        }
        (u32::from(left) << 16) | u32::from(right)
    }

    pub fn fl(&self, x: u32, keys: &RoundKeys) -> u32 {
        let mut left = (x >> 16) as u16;
        let mut right = x as u16;
        right ^= (left & keys.kl1).rotate_left(1);
        left ^= (right | keys.kl2).rotate_left(1);
        left = gf16_inverse(left);
        (u32::from(left) << 16) | u32::from(right)
    }

    fn round_function(&self, x: u32, round: usize) -> u32 {
        let keys = RoundKeys::derive(&self.material, round);
        if round % 2 == 0 {
            self.fo(self.fl(x, &keys), &keys)
        } else {
            self.fl(self.fo(x, &keys), &keys)
        }
    }

    pub fn encrypt_block(&self, block: u64) -> u64 {
        let mut left = (block >> 32) as u32;
        let mut right = block as u32;
        for round in 0..FEISTEL_ROUNDS {
            let f = self.round_function(left, round);
            (left, right) = (right ^ f, left);
        }
        (u64::from(left) << 32) | u64::from(right)
    }

    pub fn decrypt_block(&self, block: u64) -> u64 {
        let mut left = (block >> 32) as u32;
        let mut right = block as u32;
        for round in (0..FEISTEL_ROUNDS).rev() {
            let f = self.round_function(right, round);
            (left, right) = (right, left ^ f);
        }
        (u64::from(left) << 32) | u64::from(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::prng::Xorshift512;

    fn sequential_key() -> KeyMaterial {
        KeyMaterial::from_key(0x0001_0002_0003_0004_0005_0006_0007_0008)
    }

    #[test]
    fn key_words_are_big_endian() {
        assert_eq!(words(sequential_key().key()), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn modified_key_uses_the_constant() {
        let material = KeyMaterial::from_key(0);
        assert_eq!(material.modified_key(), NOTHING_UP_MY_SLEEVE);
    }

    #[test]
    fn round_zero_schedule() {
        let keys = RoundKeys::derive(&sequential_key(), 0);
        assert_eq!(keys.kl1, 2);
        assert_eq!(keys.ko1, 2 << 5);
        assert_eq!(keys.ko2, 0x0600);
        assert_eq!(keys.ko3, 0xE000);
        assert_eq!(keys.kl2, 3 ^ 0x89AB);
        assert_eq!(keys.ki1, 5 ^ 0xFEDC);
        assert_eq!(keys.ki2, 4 ^ 0xCDEF);
        assert_eq!(keys.ki3, 8 ^ 0x3210);
    }

    #[test]
    fn schedule_wraps_around() {
        let keys = RoundKeys::derive(&sequential_key(), 7);
        // i = 7: K[7] = 8, K[8 mod 8] = K[0] = 1
        assert_eq!(keys.kl1, 8u16.rotate_left(1));
        assert_eq!(keys.ko1, 1u16.rotate_left(5));
    }

    #[test]
    fn secret_keeps_low_128_bits() {
        let secret = (BigUint::from(0xFFFFu32) << 128u32) + BigUint::from(0x1234u32);
        assert_eq!(KeyMaterial::from_secret(&secret).key(), 0x1234);
        assert_eq!(KeyMaterial::from_secret(&BigUint::from(0u32)).key(), 0);
    }

    #[test]
    fn random_material_comes_from_the_keystream() {
        let a = KeyMaterial::random(&mut Rc4::new(b"seed"));
        let b = KeyMaterial::random(&mut Rc4::new(b"seed"));
        let c = KeyMaterial::random(&mut Rc4::new(b"other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        assert!(!format!("{:?}", sequential_key()).contains('1'));
    }

    #[test]
    fn sboxes_are_permutations() {
        let sboxes = SBoxes::standard();
        for table in [sboxes.s1, sboxes.s2] {
            let mut sorted = table.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..=255u8).collect::<Vec<_>>());
        }
        assert_ne!(sboxes.s1, sboxes.s2);
    }

    #[test]
    fn gf16_inverse_is_an_inverse() {
        assert_eq!(gf16_inverse(0), 0);
        assert_eq!(gf16_inverse(1), 1);
        for x in (1..=u16::MAX).step_by(257) {
            assert_eq!(gf16_mul(x, gf16_inverse(x)), 1, "x = {x:#06x}");
        }
    }

    #[test]
    fn block_round_trip() {
        let mut rng = Xorshift512::from_u64(2024);
        for _ in 0..32 {
            let bytes = rng.next_bytes(24);
            let key = u128::from_be_bytes(bytes[..16].try_into().unwrap());
            let block = u64::from_be_bytes(bytes[16..].try_into().unwrap());
            let cipher = Kasumi::new(KeyMaterial::from_key(key));
            let sealed = cipher.encrypt_block(block);
            assert_eq!(cipher.decrypt_block(sealed), block);
        }
    }

    #[test]
    fn encryption_changes_the_block() {
        let cipher = Kasumi::new(sequential_key());
        assert_ne!(cipher.encrypt_block(0), 0);
        assert_ne!(cipher.encrypt_block(0), cipher.encrypt_block(1));
    }

    #[test]
    fn key_matters() {
        let a = Kasumi::new(KeyMaterial::from_key(1));
        let b = Kasumi::new(KeyMaterial::from_key(2));
        assert_ne!(a.encrypt_block(0xDEAD_BEEF), b.encrypt_block(0xDEAD_BEEF));
    }

    #[test]
    fn wrong_key_does_not_decrypt() {
        let a = Kasumi::new(KeyMaterial::from_key(1));
        let b = Kasumi::new(KeyMaterial::from_key(2));
        let sealed = a.encrypt_block(42);
        assert_ne!(b.decrypt_block(sealed), 42);
    }
}
