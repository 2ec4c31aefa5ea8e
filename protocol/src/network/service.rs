//! Ledger service: answers ledger messages against a [`SharedLedger`].
//!
//! | Request                 | Effect                          | Answer                   |
//! |-------------------------|---------------------------------|--------------------------|
//! | `transaction_message`   | verify, append (may mine)       | `verification_message`   |
//! | `verification_message`  | verify the whole chain          | `verification_message`   |
//! | `balance_message`       | replay balances                 | `balance_message`        |
//!
//! A transaction must use the ledger's scheme, carry a valid signature and
//! be signed by the debit identity before it is appended. Rejections are
//! answered, not raised: the peer gets `valid: false` and the reason.
//!
//! Appending can mine a block, which is CPU-bound. Async callers should run
//! [`LedgerService::handle`] on a blocking thread.

use thiserror::Error;
use tracing::{info, warn};

use super::messages::{Envelope, MessageBody};
use crate::storage::SharedLedger;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("the ledger does not handle {message_type} messages")]
    Unsupported { message_type: &'static str },
}

#[derive(Debug, Clone)]
pub struct LedgerService {
    name: String,
    ledger: SharedLedger,
}

impl LedgerService {
    pub fn new(name: impl Into<String>, ledger: SharedLedger) -> Self {
        Self {
            name: name.into(),
            ledger,
        }
    }

    /// The name peers address ledger requests to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Answer one request. The answer goes back to the request's sender.
    pub fn handle(&self, request: &Envelope) -> Result<Envelope, ServiceError> {
        let body = match &request.body {
            MessageBody::TransactionMessage { transaction } => {
                match self.ledger.add_transaction(transaction.clone()) {
                    Ok(()) => {
                        info!(
                            from = %request.sender,
                            value = transaction.transaction_value,
                            "transaction appended"
                        );
                        verdict(true, "transaction accepted".to_string())
                    }
                    Err(e) => {
                        warn!(from = %request.sender, error = %e, "transaction refused");
                        verdict(false, e.to_string())
                    }
                }
            }
            MessageBody::VerificationMessage { .. } => match self.ledger.verify() {
                Ok(()) => verdict(true, "chain is valid".to_string()),
                Err(fault) => verdict(false, fault.to_string()),
            },
            MessageBody::BalanceMessage {
                public_key_to_check,
                ..
            } => MessageBody::BalanceMessage {
                public_key_to_check: public_key_to_check.clone(),
                balance: Some(self.ledger.balance(public_key_to_check)),
            },
            other => {
                return Err(ServiceError::Unsupported {
                    message_type: other.message_type(),
                })
            }
        };
        Ok(request.reply(body))
    }
}

fn verdict(valid: bool, result: String) -> MessageBody {
    MessageBody::VerificationMessage {
        valid: Some(valid),
        result: Some(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{ElGamalKeyPair, KeyPair, SignatureScheme};
    use crate::crypto::numtheory::find_safe_prime;
    use crate::crypto::prng::Xorshift512;
    use crate::storage::Blockchain;
    use crate::transaction::{sign_transaction, Transaction};

    fn service() -> LedgerService {
        LedgerService::new(
            "ledger",
            SharedLedger::new(Blockchain::new(SignatureScheme::ElGamal)),
        )
    }

    fn request(body: MessageBody) -> Envelope {
        Envelope::new("alice", "ledger", body)
    }

    fn answer(envelope: Envelope) -> (Option<bool>, Option<String>) {
        match envelope.body {
            MessageBody::VerificationMessage { valid, result } => (valid, result),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn signed_transfer_is_appended_and_counted() {
        let service = service();
        let mut rng = Xorshift512::from_u64(9);
        let p = find_safe_prime(96, &mut rng, Some(5_000_000)).unwrap();
        let alice: KeyPair = ElGamalKeyPair::generate(&p, &mut rng).unwrap().into();

        let mut tx = Transaction::new(alice.identity(), "bob", 12.5);
        sign_transaction(&mut tx, &alice, &mut rng).unwrap();

        let reply = service
            .handle(&request(MessageBody::TransactionMessage { transaction: tx }))
            .unwrap();
        assert_eq!(reply.sender, "ledger");
        assert_eq!(reply.receiver, "alice");
        assert_eq!(answer(reply).0, Some(true));

        let reply = service
            .handle(&request(MessageBody::BalanceMessage {
                public_key_to_check: "bob".into(),
                balance: None,
            }))
            .unwrap();
        assert!(matches!(
            reply.body,
            MessageBody::BalanceMessage { balance: Some(b), .. } if b == 12.5
        ));

        let reply = service
            .handle(&request(MessageBody::VerificationMessage {
                valid: None,
                result: None,
            }))
            .unwrap();
        assert_eq!(answer(reply), (Some(true), Some("chain is valid".into())));
    }

    #[test]
    fn unsigned_transfer_is_refused_with_a_reason() {
        let service = service();
        let reply = service
            .handle(&request(MessageBody::TransactionMessage {
                transaction: Transaction::new("alice", "bob", 1.0),
            }))
            .unwrap();
        let (valid, result) = answer(reply);
        assert_eq!(valid, Some(false));
        assert!(result.unwrap().contains("scheme mismatch"));
        assert!(service.ledger().snapshot().is_empty());
    }

    #[test]
    fn chat_messages_are_not_ledger_business() {
        let service = service();
        let err = service
            .handle(&request(MessageBody::Data {
                data: String::new(),
                data_size: 0,
                signature: crate::crypto::signatures::Signature::Rsa(
                    crate::crypto::signatures::RsaSignature(1u32.into()),
                ),
            }))
            .unwrap_err();
        assert_eq!(err, ServiceError::Unsupported { message_type: "data" });
    }
}
