//! # Blockchain
//!
//! The ledger proper: an ordered list of blocks plus the signature scheme
//! every transaction in it must use.
//!
//! ## Growth
//!
//! Transactions always land in the tail block. When the tail already holds
//! `block_capacity` transactions, it is mined first (sealing it) and a new
//! empty block is opened on top of it. The tail is therefore the only block
//! that is never mined, and the only block whose proof-of-work is not
//! checked.
//!
//! ## Verification
//!
//! [`Blockchain::verify_chain`] walks the blocks in order and stops at the
//! first fault. Within a block the checks run in this order:
//!
//! 1. the block number equals its position,
//! 2. `previous_hash` equals the recomputed digest of the previous block
//!    (or `"init_block"` for block 0),
//! 3. every transaction uses the chain's scheme,
//! 4. every transaction has a finite value and a signature that verifies,
//! 5. the digest meets the difficulty (skipped for the tail).
//!
//! The result is conjunctive: any single fault makes the chain invalid.

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::block::{Block, MiningBudget, MiningError};
use super::store::LedgerError;
use crate::config::{LedgerConfig, GENESIS_PREVIOUS_HASH};
use crate::crypto::keys::SignatureScheme;
use crate::transaction::{
    verify_authorship, verify_scheme, verify_transaction, Transaction, TransactionError,
};

// ---------------------------------------------------------------------------
// Faults & status
// ---------------------------------------------------------------------------

/// The first thing wrong with a chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainFault {
    #[error("block at position {block_index} is numbered {found}")]
    IndexMismatch { block_index: usize, found: u64 },

    #[error("block {block_index} does not link to its predecessor: expected {expected}, found {found}")]
    BrokenLink {
        block_index: usize,
        expected: String,
        found: String,
    },

    #[error("transaction {transaction_index} of block {block_index} is not signed with {expected}")]
    SchemeMismatch {
        block_index: usize,
        transaction_index: usize,
        expected: SignatureScheme,
    },

    #[error("transaction {transaction_index} of block {block_index} carries a non-finite value")]
    InvalidValue {
        block_index: usize,
        transaction_index: usize,
    },

    #[error("transaction {transaction_index} of block {block_index} has a bad or missing signature")]
    BadSignature {
        block_index: usize,
        transaction_index: usize,
    },

    #[error("block {block_index} has an invalid salt (hash {hash})")]
    SaltInvalid { block_index: usize, hash: String },
}

/// Where a block is in its life. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The tail, with room for more transactions.
    Open,
    /// The tail, full. The next transaction mines it.
    Sealing,
    /// Any block below the tail.
    Mined,
}

// ---------------------------------------------------------------------------
// Blockchain
// ---------------------------------------------------------------------------

/// The ledger. Serializes to `{"chain": [...], "signature_type": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blockchain {
    chain: Vec<Block>,
    signature_type: SignatureScheme,
    #[serde(skip)]
    config: LedgerConfig,
}

impl Blockchain {
    /// An empty ledger. Block 0 appears with the first transaction.
    pub fn new(signature_type: SignatureScheme) -> Self {
        Self::with_config(signature_type, LedgerConfig::default())
    }

    pub fn with_config(signature_type: SignatureScheme, config: LedgerConfig) -> Self {
        Self {
            chain: Vec::new(),
            signature_type,
            config,
        }
    }

    /// Replace the runtime parameters, e.g. after loading from disk (the
    /// config is not part of the file).
    pub fn set_config(&mut self, config: LedgerConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn signature_type(&self) -> SignatureScheme {
        self.signature_type
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Direct access to a stored block. Anything changed through this is
    /// caught by [`verify_chain`](Self::verify_chain).
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.chain.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn tail(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Append a block as-is. No checks; run `verify_chain` afterwards.
    pub fn add_block(&mut self, block: Block) {
        self.chain.push(block);
    }

    // -- growth -------------------------------------------------------------

    /// Append `tx` to the tail, mining the tail first if it is full. Uses
    /// the config's attempt limit.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), MiningError> {
        let budget = MiningBudget {
            max_attempts: self.config.max_mining_attempts,
            cancel: None,
        };
        self.add_transaction_with(tx, &budget)
    }

    /// Like [`add_transaction`](Self::add_transaction), but mining stops
    /// as soon as `cancel` is set.
    pub fn add_transaction_cancellable(
        &mut self,
        tx: Transaction,
        cancel: &AtomicBool,
    ) -> Result<(), MiningError> {
        let budget = MiningBudget {
            max_attempts: self.config.max_mining_attempts,
            cancel: Some(cancel),
        };
        self.add_transaction_with(tx, &budget)
    }

    /// Core of the add operations. If mining fails the chain is left as it
    /// was and `tx` is dropped.
    pub fn add_transaction_with(
        &mut self,
        tx: Transaction,
        budget: &MiningBudget<'_>,
    ) -> Result<(), MiningError> {
        if self.chain.is_empty() {
            self.chain.push(Block::genesis());
        }

        let capacity = self.config.block_capacity.max(1);
        if self
            .chain
            .last()
            .is_some_and(|tail| tail.transactions.len() >= capacity)
        {
            self.increment(budget)?;
        }

        if let Some(tail) = self.chain.last_mut() {
            tail.transactions.push(tx);
        }
        Ok(())
    }

    /// Verify `tx` for this ledger (scheme, signature, signer = debit
    /// account) and append it.
    pub fn accept_transaction(&mut self, tx: Transaction) -> Result<(), LedgerError> {
        verify_scheme(&tx, self.signature_type)?;
        verify_authorship(&tx)?;
        self.add_transaction(tx)?;
        Ok(())
    }

    /// Mine the tail and open the next block.
    fn increment(&mut self, budget: &MiningBudget<'_>) -> Result<(), MiningError> {
        let difficulty = self.config.difficulty;
        let Some(tail) = self.chain.last_mut() else {
            return Ok(());
        };
        tail.mine(difficulty, budget)?;
        let next = Block::next(tail);
        info!(from = tail.number, to = next.number, "chain incremented");
        self.chain.push(next);
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    /// Walk the chain and report the first fault.
    pub fn verify_chain(&self) -> Result<(), ChainFault> {
        let mut expected_previous = GENESIS_PREVIOUS_HASH.to_string();
        let tail_index = self.chain.len().saturating_sub(1);

        for (block_index, block) in self.chain.iter().enumerate() {
            if block.number != block_index as u64 {
                return Err(self.fault(ChainFault::IndexMismatch {
                    block_index,
                    found: block.number,
                }));
            }

            if block.previous_hash != expected_previous {
                return Err(self.fault(ChainFault::BrokenLink {
                    block_index,
                    expected: expected_previous,
                    found: block.previous_hash.clone(),
                }));
            }

            for (transaction_index, tx) in block.transactions.iter().enumerate() {
                if tx.signature.is_none() || verify_scheme(tx, self.signature_type).is_ok() {
                    match verify_transaction(tx) {
                        Ok(()) => {}
                        Err(TransactionError::InvalidValue) => {
                            return Err(self.fault(ChainFault::InvalidValue {
                                block_index,
                                transaction_index,
                            }));
                        }
                        Err(_) => {
                            return Err(self.fault(ChainFault::BadSignature {
                                block_index,
                                transaction_index,
                            }));
                        }
                    }
                } else {
                    return Err(self.fault(ChainFault::SchemeMismatch {
                        block_index,
                        transaction_index,
                        expected: self.signature_type,
                    }));
                }
            }

            let digest = block.hash_hex();
            if block_index != tail_index && !block.satisfies_difficulty(self.config.difficulty) {
                return Err(self.fault(ChainFault::SaltInvalid {
                    block_index,
                    hash: digest,
                }));
            }
            expected_previous = digest;
        }
        Ok(())
    }

    fn fault(&self, fault: ChainFault) -> ChainFault {
        warn!(%fault, "chain verification failed");
        fault
    }

    pub fn is_valid(&self) -> bool {
        self.verify_chain().is_ok()
    }

    /// Replay every transaction: credits add, debits subtract. A transfer
    /// to oneself nets to zero.
    pub fn balance(&self, identity: &str) -> f64 {
        self.chain
            .iter()
            .flat_map(|block| &block.transactions)
            .fold(0.0, |balance, tx| {
                let mut balance = balance;
                if tx.debit_user_public_key == identity {
                    balance -= tx.transaction_value;
                }
                if tx.credit_user_public_key == identity {
                    balance += tx.transaction_value;
                }
                balance
            })
    }

    /// `None` if there is no block at `index`.
    pub fn block_status(&self, index: usize) -> Option<BlockStatus> {
        let block = self.chain.get(index)?;
        if index + 1 < self.chain.len() {
            return Some(BlockStatus::Mined);
        }
        if block.transactions.len() >= self.config.block_capacity.max(1) {
            Some(BlockStatus::Sealing)
        } else {
            Some(BlockStatus::Open)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
