//! Transaction verification: signature checks with a reason attached.
//!
//! The signature primitives answer yes or no. This layer says *why* a
//! transaction was rejected, which is what logs and network replies need.
//!
//! Two levels of strictness:
//!
//! - [`verify_transaction`] checks that the attached signature verifies
//!   over the canonical payload with the embedded key. This is the rule the
//!   chain verifier applies to stored blocks.
//! - [`verify_authorship`] additionally requires the embedded key to *be*
//!   the debit identity. The ledger service applies it to incoming
//!   transactions so nobody can spend from an identity they don't hold.

use thiserror::Error;
use tracing::warn;

use super::types::Transaction;
use crate::crypto::keys::SignatureScheme;
use crate::crypto::signatures::verify;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction is not signed (signature field is `None`).
    #[error("transaction is unsigned")]
    MissingSignature,

    /// The value is NaN or infinite. JSON has no spelling for either, so
    /// such a transaction could not be stored or signed unambiguously.
    #[error("transaction value is not a finite number")]
    InvalidValue,

    /// Transactions are signed once; re-signing is refused.
    #[error("transaction is already signed")]
    AlreadySigned,

    /// The signature does not verify against the embedded key.
    #[error("invalid signature: does not verify for debit account {debit}")]
    InvalidSignature { debit: String },

    /// The signature uses a different scheme than required.
    #[error("signature scheme mismatch: expected {expected}, found {}", .found.as_ref().map_or("none", |s| s.as_str()))]
    SchemeMismatch {
        expected: SignatureScheme,
        found: Option<SignatureScheme>,
    },

    /// The signer is not the account being debited.
    #[error("signer is not the debit account {debit}")]
    SignerMismatch { debit: String },
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Reject values that have no JSON representation.
pub fn verify_value(tx: &Transaction) -> Result<(), TransactionError> {
    if !tx.transaction_value.is_finite() {
        warn!(debit = %tx.debit_user_public_key, "transaction value is not finite");
        return Err(TransactionError::InvalidValue);
    }
    Ok(())
}

/// Verify the value and the attached signature over
/// [`Transaction::signable_payload`].
pub fn verify_transaction(tx: &Transaction) -> Result<(), TransactionError> {
    verify_value(tx)?;
    let attached = tx
        .signature
        .as_ref()
        .ok_or(TransactionError::MissingSignature)?;

    if !verify(
        &attached.public_key(),
        &attached.signature(),
        &tx.signable_payload(),
    ) {
        warn!(debit = %tx.debit_user_public_key, "transaction signature rejected");
        return Err(TransactionError::InvalidSignature {
            debit: tx.debit_user_public_key.clone(),
        });
    }
    Ok(())
}

/// Require a specific scheme, e.g. the one a ledger was created with.
pub fn verify_scheme(tx: &Transaction, expected: SignatureScheme) -> Result<(), TransactionError> {
    let found = tx.signature.as_ref().map(|s| s.scheme());
    if found != Some(expected) {
        return Err(TransactionError::SchemeMismatch { expected, found });
    }
    Ok(())
}

/// [`verify_transaction`] plus: the signing key is the debit identity.
pub fn verify_authorship(tx: &Transaction) -> Result<(), TransactionError> {
    verify_transaction(tx)?;
    let signer = tx
        .signature
        .as_ref()
        .map(|s| s.signer_identity())
        .unwrap_or_default();
    if signer != tx.debit_user_public_key {
        warn!(debit = %tx.debit_user_public_key, "transaction signed by a different key");
        return Err(TransactionError::SignerMismatch {
            debit: tx.debit_user_public_key.clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
