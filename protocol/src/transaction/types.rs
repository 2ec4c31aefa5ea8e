//! Core type definitions for ledger transactions.
//!
//! A transaction moves `transaction_value` from the debit identity to the
//! credit identity. Identities are the decimal concatenation of a public
//! key's components (see [`crate::crypto::keys`]).

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{ElGamalPublicKey, PublicKey, RsaPublicKey, SignatureScheme};
use crate::crypto::signatures::{ElGamalSignature, RsaSignature, Signature};
use crate::encoding::decimal;

// ---------------------------------------------------------------------------
// TransactionSignature
// ---------------------------------------------------------------------------

/// Signature attached to a transaction, together with the signer's public
/// key components so anyone can verify it without a key directory.
///
/// Tagged by `signature_type` on the wire:
///
/// ```text
/// {"signature_type":"El_gamal","p":"..","alpha":"..","h":"..","signature":["s1","s2"]}
/// {"signature_type":"RSA","n":"..","e":"..","signature":".."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signature_type")]
pub enum TransactionSignature {
    #[serde(rename = "El_gamal")]
    ElGamal {
        #[serde(with = "decimal")]
        p: BigUint,
        #[serde(with = "decimal")]
        alpha: BigUint,
        #[serde(with = "decimal")]
        h: BigUint,
        signature: ElGamalSignature,
    },
    #[serde(rename = "RSA")]
    Rsa {
        #[serde(with = "decimal")]
        n: BigUint,
        #[serde(with = "decimal")]
        e: BigUint,
        signature: RsaSignature,
    },
}

impl TransactionSignature {
    /// Pair a public key with a signature from the same scheme. `None` if
    /// the schemes differ.
    pub fn new(public_key: PublicKey, signature: Signature) -> Option<Self> {
        match (public_key, signature) {
            (PublicKey::ElGamal(key), Signature::ElGamal(signature)) => Some(Self::ElGamal {
                p: key.p,
                alpha: key.alpha,
                h: key.h,
                signature,
            }),
            (PublicKey::Rsa(key), Signature::Rsa(signature)) => Some(Self::Rsa {
                n: key.n,
                e: key.e,
                signature,
            }),
            _ => None,
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::ElGamal { .. } => SignatureScheme::ElGamal,
            Self::Rsa { .. } => SignatureScheme::Rsa,
        }
    }

    /// The embedded signer key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::ElGamal { p, alpha, h, .. } => PublicKey::ElGamal(ElGamalPublicKey {
                p: p.clone(),
                alpha: alpha.clone(),
                h: h.clone(),
            }),
            Self::Rsa { n, e, .. } => PublicKey::Rsa(RsaPublicKey {
                n: n.clone(),
                e: e.clone(),
            }),
        }
    }

    pub fn signature(&self) -> Signature {
        match self {
            Self::ElGamal { signature, .. } => Signature::ElGamal(signature.clone()),
            Self::Rsa { signature, .. } => Signature::Rsa(signature.clone()),
        }
    }

    /// Identity of whoever produced this signature.
    pub fn signer_identity(&self) -> String {
        self.public_key().identity()
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A value transfer between two identities.
///
/// Field order is the canonical JSON order, and the JSON is what gets
/// signed and hashed. Don't reorder the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub debit_user_public_key: String,
    pub credit_user_public_key: String,
    pub transaction_value: f64,
    pub signature: Option<TransactionSignature>,
}

/// The signed view of a transaction: everything, with the signature forced
/// to `null`.
#[derive(Serialize)]
struct SignablePayload<'a> {
    debit_user_public_key: &'a str,
    credit_user_public_key: &'a str,
    transaction_value: f64,
    signature: Option<()>,
}

impl Transaction {
    /// An unsigned transfer.
    pub fn new(debit: impl Into<String>, credit: impl Into<String>, value: f64) -> Self {
        Self {
            debit_user_public_key: debit.into(),
            credit_user_public_key: credit.into(),
            transaction_value: value,
            signature: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Canonical bytes covered by the signature: the transaction's JSON with
    /// `"signature": null`. Pure; the transaction itself is not touched.
    pub fn signable_payload(&self) -> Vec<u8> {
        let payload = SignablePayload {
            debit_user_public_key: &self.debit_user_public_key,
            credit_user_public_key: &self.credit_user_public_key,
            transaction_value: self.transaction_value,
            signature: None,
        };
        serde_json::to_vec(&payload).unwrap_or_default()
    }

    /// Whether the attached signature verifies. Unsigned is invalid.
    pub fn is_valid(&self) -> bool {
        super::verification::verify_transaction(self).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
