//! # Chaining Modes
//!
//! Turns the 64-bit [`Kasumi`] block function into a message cipher. Four
//! modes, all over zero-padded 8-byte blocks read big-endian:
//!
//! | Mode | Encrypt                          | Chain value after block      |
//! |------|----------------------------------|------------------------------|
//! | ECB  | `C = E(P)`                       | n/a                          |
//! | CBC  | `C = E(P ^ V)`                   | `V = C`                      |
//! | PCBC | `C = E(P ^ V)`                   | `V = P ^ C`                  |
//! | CTR  | `C = P ^ E(counter)`             | counter counts up from 0     |
//!
//! `V` starts at the IV. ECB and CTR ignore it.
//!
//! ## Padding
//!
//! A message of `len` bytes occupies `ceil(len / 8)` blocks, the last one
//! zero-filled. No extra block is added when `len` is already a multiple of
//! 8, and an empty message encrypts to an empty ciphertext. The padding is
//! not self-describing, so callers that care about trailing zero bytes carry
//! the original length alongside the ciphertext (see [`decrypt_exact`]).
//!
//! There is no authentication here. Integrity comes from the signature the
//! session layer puts next to every ciphertext.

use thiserror::Error;

use super::kasumi::Kasumi;
use crate::config::{CIPHER_BLOCK_BYTES, DEFAULT_IV};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("ciphertext length {len} is not a multiple of {CIPHER_BLOCK_BYTES}")]
    UnalignedCiphertext { len: usize },

    #[error("declared length {declared} exceeds the {available} decrypted bytes")]
    LengthMismatch { declared: usize, available: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainingMode {
    Ecb,
    #[default]
    Cbc,
    Pcbc,
    Ctr,
}

/// Zero-pad to a whole number of blocks.
pub fn pad(message: &[u8]) -> Vec<u8> {
    let mut padded = message.to_vec();
    let remainder = padded.len() % CIPHER_BLOCK_BYTES;
    if remainder != 0 {
        padded.resize(padded.len() + CIPHER_BLOCK_BYTES - remainder, 0);
    }
    padded
}

fn blocks(data: &[u8]) -> impl Iterator<Item = u64> + '_ {
    data.chunks_exact(CIPHER_BLOCK_BYTES).map(|chunk| {
        let mut block = [0u8; CIPHER_BLOCK_BYTES];
        block.copy_from_slice(chunk);
        u64::from_be_bytes(block)
    })
}

pub fn encrypt(cipher: &Kasumi, mode: ChainingMode, iv: u64, plaintext: &[u8]) -> Vec<u8> {
    let padded = pad(plaintext);
    let mut out = Vec::with_capacity(padded.len());
    let mut chain = iv;

    for (counter, block) in (0u64..).zip(blocks(&padded)) {
        let sealed = match mode {
            ChainingMode::Ecb => cipher.encrypt_block(block),
            ChainingMode::Cbc => {
                let sealed = cipher.encrypt_block(block ^ chain);
                chain = sealed;
                sealed
            }
            ChainingMode::Pcbc => {
                let sealed = cipher.encrypt_block(block ^ chain);
                chain = block ^ sealed;
                sealed
            }
            ChainingMode::Ctr => block ^ cipher.encrypt_block(counter),
        };
        out.extend_from_slice(&sealed.to_be_bytes());
    }
    out
}

/// Inverse of [`encrypt`]. The result keeps the zero padding.
pub fn decrypt(
    cipher: &Kasumi,
    mode: ChainingMode,
    iv: u64,
    ciphertext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if ciphertext.len() % CIPHER_BLOCK_BYTES != 0 {
        return Err(EncryptionError::UnalignedCiphertext {
            len: ciphertext.len(),
        });
    }

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut chain = iv;

    for (counter, block) in (0u64..).zip(blocks(ciphertext)) {
        let opened = match mode {
            ChainingMode::Ecb => cipher.decrypt_block(block),
            ChainingMode::Cbc => {
                let opened = cipher.decrypt_block(block) ^ chain;
                chain = block;
                opened
            }
            ChainingMode::Pcbc => {
                let opened = cipher.decrypt_block(block) ^ chain;
                chain = opened ^ block;
                opened
            }
            ChainingMode::Ctr => block ^ cipher.encrypt_block(counter),
        };
        out.extend_from_slice(&opened.to_be_bytes());
    }
    Ok(out)
}

/// Decrypt and cut the result back to the original message length.
pub fn decrypt_exact(
    cipher: &Kasumi,
    mode: ChainingMode,
    iv: u64,
    ciphertext: &[u8],
    original_len: usize,
) -> Result<Vec<u8>, EncryptionError> {
    let mut plaintext = decrypt(cipher, mode, iv, ciphertext)?;
    if original_len > plaintext.len() {
        return Err(EncryptionError::LengthMismatch {
            declared: original_len,
            available: plaintext.len(),
        });
    }
    plaintext.truncate(original_len);
    Ok(plaintext)
}

/// CBC with the default IV. What the secure channel uses.
pub fn cipher_message(cipher: &Kasumi, message: &[u8]) -> Vec<u8> {
    encrypt(cipher, ChainingMode::Cbc, DEFAULT_IV, message)
}

/// Inverse of [`cipher_message`], trimmed to `original_len`.
pub fn decipher_message(
    cipher: &Kasumi,
    ciphertext: &[u8],
    original_len: usize,
) -> Result<Vec<u8>, EncryptionError> {
    decrypt_exact(cipher, ChainingMode::Cbc, DEFAULT_IV, ciphertext, original_len)
}
