//! # Block Structure
//!
//! A block is an ordered batch of transactions, a link to its predecessor
//! and a salt. The link is the predecessor's sponge digest, so tampering
//! with any sealed block breaks every link after it.
//!
//! ## Block Layout
//!
//! ```text
//! {
//!   "transactions":  [Transaction, ...],
//!   "number":        u64          (0 for genesis)
//!   "previous_hash": hex digest   ("init_block" for genesis)
//!   "salt":          u64          (proof-of-work nonce)
//! }
//! ```
//!
//! ## Hash Computation
//!
//! The block hash is the sponge digest of exactly that JSON, salt included.
//! Mining searches salts `0, 1, 2, ...` until the digest ends in
//! `difficulty` zero bits.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::GENESIS_PREVIOUS_HASH;
use crate::crypto::hash::sponge_hash;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Mining budget
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("no valid salt found within {attempts} attempts")]
    Exhausted { attempts: u64 },
}

/// Limits on a mining run. The default is unbounded and uncancellable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiningBudget<'a> {
    /// Give up after this many salts.
    pub max_attempts: Option<u64>,
    /// Checked before every attempt; set it from another thread to stop.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> MiningBudget<'a> {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn attempts(max_attempts: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A batch of transactions in the chain. Field order is the hashed JSON
/// order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub transactions: Vec<Transaction>,
    pub number: u64,
    pub previous_hash: String,
    pub salt: u64,
}

impl Block {
    /// Block 0: empty, pointing at the genesis sentinel.
    pub fn genesis() -> Self {
        Self {
            transactions: Vec::new(),
            number: 0,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            salt: 0,
        }
    }

    /// The empty block that follows `sealed`.
    pub fn next(sealed: &Block) -> Self {
        Self {
            transactions: Vec::new(),
            number: sealed.number + 1,
            previous_hash: sealed.hash_hex(),
            salt: 0,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }

    /// Sponge digest of the block's JSON.
    pub fn hash_bytes(&self) -> Vec<u8> {
        sponge_hash(&serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash_bytes())
    }

    /// Whether the digest ends in at least `difficulty` zero bits.
    pub fn satisfies_difficulty(&self, difficulty: u32) -> bool {
        trailing_zero_bits(&self.hash_bytes()) >= difficulty
    }

    /// Search salts from 0 upward until the digest meets `difficulty`.
    ///
    /// On success the salt is left in place and the winning digest is
    /// returned as hex. On failure the salt is restored and the block is
    /// exactly as it was.
    pub fn mine(&mut self, difficulty: u32, budget: &MiningBudget<'_>) -> Result<String, MiningError> {
        let original_salt = self.salt;
        let mut attempts = 0u64;

        loop {
            if budget.is_cancelled() {
                self.salt = original_salt;
                return Err(MiningError::Cancelled { attempts });
            }
            if budget.max_attempts.is_some_and(|limit| attempts >= limit) {
                self.salt = original_salt;
                return Err(MiningError::Exhausted { attempts });
            }

            self.salt = attempts;
            attempts += 1;

            let digest = self.hash_bytes();
            if trailing_zero_bits(&digest) >= difficulty {
                let digest = hex::encode(digest);
                info!(block = self.number, salt = self.salt, hash = %digest, "block mined");
                return Ok(digest);
            }
            if attempts % 256 == 0 {
                debug!(block = self.number, attempts, "mining...");
            }
        }
    }
}

/// Number of zero bits at the end of `bytes` read as one big-endian string.
pub(crate) fn trailing_zero_bits(bytes: &[u8]) -> u32 {
    let mut zeros = 0;
    for &byte in bytes.iter().rev() {
        if byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.trailing_zeros();
            break;
        }
    }
    zeros
}
