//! # Transaction Module
//!
//! Construction, signing and verification of ledger transactions. Every
//! value transfer in the chain is a [`Transaction`].
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - Transaction and the TransactionSignature it carries
//! signing.rs      - sign_transaction with an ElGamal or RSA key pair
//! verification.rs - signature, scheme and authorship checks
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** - [`Transaction::new`] with debit identity, credit identity
//!    and value.
//! 2. **Sign** - [`sign_transaction`] with the debit identity's key pair.
//! 3. **Submit** - hand it to a [`Blockchain`](crate::storage::Blockchain)
//!    or send a `transaction_message` to the ledger service.
//! 4. **Verify** - [`verify_transaction`] runs on every stored transaction
//!    whenever the chain is verified.
//!
//! ## Design Decisions
//!
//! - Values are `f64`, because that is what the ledger file format stores.
//!   Balances are replayed sums; don't expect exact decimal arithmetic.
//! - The signed payload is the transaction's own JSON with the signature
//!   set to `null`, so a stored transaction can always be re-verified from
//!   the ledger file alone.

pub mod signing;
pub mod types;
pub mod verification;

pub use signing::sign_transaction;
pub use types::{Transaction, TransactionSignature};
pub use verification::{
    verify_authorship, verify_scheme, verify_transaction, verify_value, TransactionError,
};
