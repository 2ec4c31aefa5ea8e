//! # Ledger Store
//!
//! The ledger lives in one JSON file, `{"chain": [...], "signature_type":
//! "..."}`. There is no database: a ledger is small, and a plain file can be
//! inspected, diffed and copied by hand.
//!
//! ## Atomicity
//!
//! Saves write the whole ledger to a sibling temp file and rename it over
//! the target. A crash mid-save leaves either the old ledger or the new
//! one, never half of each.
//!
//! ## Concurrency
//!
//! [`LedgerStore`] serializes its own operations with a mutex, which covers
//! several handles inside one process. It does not lock the file against
//! other processes. In-process writers that also want the chain in memory
//! should go through [`SharedLedger`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::block::MiningError;
use super::chain::{Blockchain, ChainFault};
use crate::config::LedgerConfig;
use crate::crypto::keys::SignatureScheme;
use crate::transaction::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger file {path} is not a valid ledger: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Anything that can go wrong while changing a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction rejected: {0}")]
    Transaction(#[from] TransactionError),

    #[error("mining failed: {0}")]
    Mining(#[from] MiningError),

    #[error("chain is invalid: {0}")]
    Chain(#[from] ChainFault),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// A ledger file on disk.
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LedgerStore {
    /// Point at `path`. Nothing is read or created until the first load or
    /// save.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger. A missing file is `Ok(None)`.
    pub fn load(&self, config: &LedgerConfig) -> Result<Option<Blockchain>, StoreError> {
        let _guard = self.lock.lock();
        self.read(config)
    }

    /// Read the ledger, or start an empty one with `scheme` if there is no
    /// file yet. The empty ledger is not written until saved.
    pub fn load_or_new(
        &self,
        scheme: SignatureScheme,
        config: &LedgerConfig,
    ) -> Result<Blockchain, StoreError> {
        let _guard = self.lock.lock();
        Ok(self
            .read(config)?
            .unwrap_or_else(|| Blockchain::with_config(scheme, config.clone())))
    }

    /// Replace the file with `chain`.
    pub fn save(&self, chain: &Blockchain) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        self.write(chain)
    }

    /// Load (or create), run `f`, and save, all under the store lock. If
    /// `f` fails nothing is written.
    pub fn transact<T>(
        &self,
        scheme: SignatureScheme,
        config: &LedgerConfig,
        f: impl FnOnce(&mut Blockchain) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let _guard = self.lock.lock();
        let mut chain = self
            .read(config)?
            .unwrap_or_else(|| Blockchain::with_config(scheme, config.clone()));
        let out = f(&mut chain)?;
        self.write(&chain)?;
        Ok(out)
    }

    // -- unlocked helpers ---------------------------------------------------

    fn read(&self, config: &LedgerConfig) -> Result<Option<Blockchain>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger file yet");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut chain: Blockchain =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        chain.set_config(config.clone());
        debug!(path = %self.path.display(), blocks = chain.len(), "ledger loaded");
        Ok(Some(chain))
    }

    fn write(&self, chain: &Blockchain) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(chain).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        info!(path = %self.path.display(), blocks = chain.len(), "ledger saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SharedLedger
// ---------------------------------------------------------------------------

/// A ledger shared between tasks, one writer at a time.
///
/// With a store attached every successful change is written through. If the
/// write fails, the in-memory chain is rolled back so memory and disk never
/// disagree.
#[derive(Debug, Clone)]
pub struct SharedLedger {
    chain: Arc<Mutex<Blockchain>>,
    store: Option<Arc<LedgerStore>>,
}

impl SharedLedger {
    /// In-memory only.
    pub fn new(chain: Blockchain) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            store: None,
        }
    }

    /// Load from `store` (or start empty) and write through to it.
    pub fn persistent(
        store: LedgerStore,
        scheme: SignatureScheme,
        config: &LedgerConfig,
    ) -> Result<Self, StoreError> {
        let chain = store.load_or_new(scheme, config)?;
        Ok(Self {
            chain: Arc::new(Mutex::new(chain)),
            store: Some(Arc::new(store)),
        })
    }

    pub fn signature_type(&self) -> SignatureScheme {
        self.chain.lock().signature_type()
    }

    /// Check `tx` with [`Blockchain::accept_transaction`] and append it.
    pub fn add_transaction(&self, tx: Transaction) -> LedgerResult<()> {
        let mut chain = self.chain.lock();
        let before = self.store.as_ref().map(|_| chain.clone());

        chain.accept_transaction(tx)?;

        if let (Some(store), Some(before)) = (&self.store, before) {
            if let Err(e) = store.save(&chain) {
                warn!(error = %e, "ledger save failed, rolling back");
                *chain = before;
                return Err(e.into());
            }
        }
        Ok(())
    }

    pub fn verify(&self) -> Result<(), ChainFault> {
        self.chain.lock().verify_chain()
    }

    pub fn balance(&self, identity: &str) -> f64 {
        self.chain.lock().balance(identity)
    }

    /// A copy of the current chain.
    pub fn snapshot(&self) -> Blockchain {
        self.chain.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
