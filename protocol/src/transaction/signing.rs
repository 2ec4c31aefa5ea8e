//! Transaction signing.
//!
//! Signing is a separate step from construction because the key may live
//! somewhere else (a key file, another process). The signed bytes are the
//! canonical [`Transaction::signable_payload`], which always carries
//! `"signature": null`, so signing never changes what gets signed.

use super::types::{Transaction, TransactionSignature};
use super::verification::{verify_value, TransactionError};
use crate::crypto::keys::KeyPair;
use crate::crypto::prng::Xorshift512;

/// Sign `tx` in place with `keypair` and return the attached signature.
///
/// A transaction is signed at most once: signing an already-signed
/// transaction is refused with [`TransactionError::AlreadySigned`] and the
/// existing signature is left untouched. A NaN or infinite value is
/// refused with [`TransactionError::InvalidValue`].
///
/// The caller is responsible for `keypair` matching
/// `tx.debit_user_public_key`; [`super::verify_authorship`] checks it.
pub fn sign_transaction<'a>(
    tx: &'a mut Transaction,
    keypair: &KeyPair,
    rng: &mut Xorshift512,
) -> Result<&'a TransactionSignature, TransactionError> {
    if tx.signature.is_some() {
        return Err(TransactionError::AlreadySigned);
    }
    verify_value(tx)?;
    let signature = keypair.sign(&tx.signable_payload(), rng);
    let attached = TransactionSignature::new(keypair.public_key(), signature)
        .ok_or(TransactionError::SchemeMismatch {
            expected: keypair.scheme(),
            found: None,
        })?;
    Ok(tx.signature.insert(attached))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
