//! # Storage Module
//!
//! The proof-of-work ledger and its persistence.
//!
//! ## Architecture
//!
//! ```text
//! block.rs  - Block structure, genesis, digest, mining
//! chain.rs  - Blockchain growth, verification, balances
//! store.rs  - JSON ledger file and the shared in-process handle
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Transaction → Blockchain::accept_transaction → tail Block
//!                        ↓ (tail full)
//!                  Block::mine → Block::next
//!                        ↓
//!                  LedgerStore::save (ledger.json)
//! ```
//!
//! ## Design Decisions
//!
//! 1. **The sponge hash for block digests.** Blocks are hashed with the
//!    crate's own sponge construction over their JSON, so the file format
//!    *is* the hashed format.
//!
//! 2. **JSON on disk.** A ledger is one human-readable file. Big integers
//!    are decimal strings.
//!
//! 3. **Only the tail is unmined.** A block is mined exactly when it fills
//!    up and the next transaction arrives.

pub mod block;
pub mod chain;
pub mod store;

pub use block::{Block, MiningBudget, MiningError};
pub use chain::{BlockStatus, Blockchain, ChainFault};
pub use store::{LedgerError, LedgerResult, LedgerStore, SharedLedger, StoreError};
