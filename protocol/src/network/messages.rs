//! Wire messages.
//!
//! Every frame carries one [`Envelope`]: routing fields plus a body tagged by
//! `message_type`. The body's fields sit at the top level of the JSON
//! object, next to `sender` and `receiver`:
//!
//! ```text
//! {"sender":"alice","receiver":"bob","message_type":"diffie_hellman",
//!  "diffie_hellman_step":1,"p":"..","alpha":"..","A":".."}
//! {"sender":"alice","receiver":"bob","message_type":"signature_init",
//!  "signature_type":"RSA","n":"..","e":".."}
//! {"sender":"alice","receiver":"bob","message_type":"data",
//!  "data":"<base64>","data_size":5,"signature":".."}
//! ```
//!
//! The relay only needs `receiver`; [`RouteHeader`] reads just that.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::exchange::{DhOffer, DhReply};
use crate::crypto::keys::PublicKey;
use crate::crypto::signatures::Signature;
use crate::encoding::decimal_option;
use crate::transaction::Transaction;

/// First frame on a relay connection: who is connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
}

/// The routing part of an envelope. Unknown fields are ignored, so any
/// envelope parses as a `RouteHeader`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteHeader {
    pub sender: String,
    pub receiver: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: String,
    pub receiver: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Envelope {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, body: MessageBody) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            body,
        }
    }

    /// An envelope going back the way this one came.
    pub fn reply(&self, body: MessageBody) -> Self {
        Self {
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum MessageBody {
    DiffieHellman(DhMessage),
    /// The sender's public key, flat: `signature_type` plus its fields.
    SignatureInit(PublicKey),
    /// Encrypted, signed text. `data` is base64 ciphertext, `data_size`
    /// the plaintext length before padding.
    Data {
        data: String,
        data_size: usize,
        signature: Signature,
    },
    /// Ask the ledger to append a signed transaction.
    TransactionMessage { transaction: Transaction },
    /// Request: both fields absent. Answer: `valid` plus a human-readable
    /// `result`.
    VerificationMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        valid: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// Request: `balance` absent. Answer: `balance` filled in.
    BalanceMessage {
        public_key_to_check: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        balance: Option<f64>,
    },
}

impl MessageBody {
    /// The `message_type` tag this body is sent under.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::DiffieHellman(_) => "diffie_hellman",
            Self::SignatureInit(_) => "signature_init",
            Self::Data { .. } => "data",
            Self::TransactionMessage { .. } => "transaction_message",
            Self::VerificationMessage { .. } => "verification_message",
            Self::BalanceMessage { .. } => "balance_message",
        }
    }
}

/// Both Diffie-Hellman steps share one message type, told apart by
/// `diffie_hellman_step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhMessage {
    pub diffie_hellman_step: u8,
    #[serde(default, with = "decimal_option", skip_serializing_if = "Option::is_none")]
    pub p: Option<BigUint>,
    #[serde(default, with = "decimal_option", skip_serializing_if = "Option::is_none")]
    pub alpha: Option<BigUint>,
    #[serde(
        rename = "A",
        default,
        with = "decimal_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub a: Option<BigUint>,
    #[serde(
        rename = "B",
        default,
        with = "decimal_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub b: Option<BigUint>,
}

impl DhMessage {
    pub fn offer(offer: &DhOffer) -> Self {
        Self {
            diffie_hellman_step: 1,
            p: Some(offer.p.clone()),
            alpha: Some(offer.alpha.clone()),
            a: Some(offer.a.clone()),
            b: None,
        }
    }

    pub fn reply(reply: &DhReply) -> Self {
        Self {
            diffie_hellman_step: 2,
            p: None,
            alpha: None,
            a: None,
            b: Some(reply.b.clone()),
        }
    }

    /// The step 1 payload, if this is a complete step 1 message.
    pub fn to_offer(&self) -> Option<DhOffer> {
        if self.diffie_hellman_step != 1 {
            return None;
        }
        Some(DhOffer {
            p: self.p.clone()?,
            alpha: self.alpha.clone()?,
            a: self.a.clone()?,
        })
    }

    /// The step 2 payload, if this is a complete step 2 message.
    pub fn to_reply(&self) -> Option<DhReply> {
        if self.diffie_hellman_step != 2 {
            return None;
        }
        Some(DhReply {
            b: self.b.clone()?,
        })
    }
}
