//! # Secure Channel
//!
//! One end of an end-to-end encrypted, signed conversation between two
//! named peers, routed through the relay. The channel is pure state: it
//! turns incoming [`Envelope`]s into [`SessionEvent`]s and produces the
//! envelopes to send back. Sockets and consoles belong to the caller.
//!
//! ## Handshake
//!
//! ```text
//! alice                                   bob
//!   | -- diffie_hellman step 1 (p, alpha, A) -> |   bob derives the key
//!   | <- diffie_hellman step 2 (B) ------------ |   alice derives the key
//!   | -- signature_init (alice's key) --------> |
//!   | <- signature_init (bob's key) ----------- |   sent once, on first receipt
//!   | -- data ---------------------------------> |
//! ```
//!
//! ## Data messages
//!
//! The plaintext is signed, then encrypted with Kasumi in CBC mode under
//! the shared key, then base64-encoded. `data_size` carries the plaintext
//! length so the receiver can strip the block padding before checking the
//! signature.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use num_bigint::BigUint;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::messages::{DhMessage, Envelope, MessageBody};
use crate::crypto::encryption::{cipher_message, decipher_message, EncryptionError};
use crate::crypto::exchange::{
    diffie_hellman_step_1, diffie_hellman_step_2, DhInitiator, ExchangeError,
};
use crate::crypto::kasumi::Kasumi;
use crate::crypto::keys::{KeyPair, PublicKey};
use crate::crypto::prng::Xorshift512;
use crate::crypto::signatures::verify;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session key yet; run the Diffie-Hellman exchange first")]
    NoSessionKey,

    #[error("received a step 2 reply without having sent step 1")]
    NoPendingExchange,

    #[error("malformed diffie_hellman message (step {step})")]
    MalformedExchange { step: u8 },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error("data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// What an incoming envelope did to the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// We answered step 1; send this reply. The key is now set.
    ExchangeReply(Envelope),
    /// Step 3 done, the key is now set.
    KeyEstablished,
    /// The peer's public key is stored. Send `reply` (our own key) if any.
    PeerKey { reply: Option<Envelope> },
    /// A data message, decrypted. `verified` is false when the signature
    /// does not check out or no peer key is known yet.
    Message {
        sender: String,
        text: Vec<u8>,
        verified: bool,
    },
    /// Not a channel message (e.g. a ledger answer).
    Unhandled(Envelope),
}

pub struct SecureChannel {
    name: String,
    peer: String,
    keypair: KeyPair,
    rng: Xorshift512,
    pending: Option<DhInitiator>,
    cipher: Option<Kasumi>,
    peer_key: Option<PublicKey>,
    announced: bool,
}

impl SecureChannel {
    pub fn new(
        name: impl Into<String>,
        peer: impl Into<String>,
        keypair: KeyPair,
        rng: Xorshift512,
    ) -> Self {
        Self {
            name: name.into(),
            peer: peer.into(),
            keypair,
            rng,
            pending: None,
            cipher: None,
            peer_key: None,
            announced: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn has_key(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn peer_key(&self) -> Option<&PublicKey> {
        self.peer_key.as_ref()
    }

    fn envelope(&self, body: MessageBody) -> Envelope {
        Envelope::new(self.name.clone(), self.peer.clone(), body)
    }

    /// Step 1 in the group of `p`. Replaces any unfinished exchange.
    pub fn start_exchange(&mut self, p: &BigUint) -> Result<Envelope, SessionError> {
        let (offer, initiator) = diffie_hellman_step_1(p, &mut self.rng)?;
        self.pending = Some(initiator);
        debug!(peer = %self.peer, "key exchange started");
        Ok(self.envelope(MessageBody::DiffieHellman(DhMessage::offer(&offer))))
    }

    /// Our public key, as a `signature_init` message.
    pub fn announce_key(&mut self) -> Envelope {
        self.announced = true;
        self.envelope(MessageBody::SignatureInit(self.keypair.public_key()))
    }

    /// Sign, encrypt and encode `text` for the peer.
    pub fn seal(&mut self, text: &[u8]) -> Result<Envelope, SessionError> {
        let cipher = self.cipher.as_ref().ok_or(SessionError::NoSessionKey)?;
        let signature = self.keypair.sign(text, &mut self.rng);
        let data = STANDARD.encode(cipher_message(cipher, text));
        Ok(self.envelope(MessageBody::Data {
            data,
            data_size: text.len(),
            signature,
        }))
    }

    /// Apply an incoming envelope.
    pub fn handle(&mut self, envelope: Envelope) -> Result<SessionEvent, SessionError> {
        let Envelope {
            sender,
            receiver,
            body,
        } = envelope;
        match body {
            MessageBody::DiffieHellman(dh) => self.on_exchange(&sender, &dh),
            MessageBody::SignatureInit(key) => {
                info!(peer = %sender, scheme = %key.scheme(), "peer key received");
                self.peer_key = Some(key);
                let reply = (!self.announced).then(|| {
                    self.announced = true;
                    Envelope::new(
                        receiver,
                        sender,
                        MessageBody::SignatureInit(self.keypair.public_key()),
                    )
                });
                Ok(SessionEvent::PeerKey { reply })
            }
            MessageBody::Data {
                data,
                data_size,
                signature,
            } => {
                let cipher = self.cipher.as_ref().ok_or(SessionError::NoSessionKey)?;
                let ciphertext = STANDARD.decode(data)?;
                let text = decipher_message(cipher, &ciphertext, data_size)?;
                let verified = self
                    .peer_key
                    .as_ref()
                    .is_some_and(|key| verify(key, &signature, &text));
                if !verified {
                    warn!(sender = %sender, "data message failed verification");
                }
                Ok(SessionEvent::Message {
                    sender,
                    text,
                    verified,
                })
            }
            body => Ok(SessionEvent::Unhandled(Envelope {
                sender,
                receiver,
                body,
            })),
        }
    }

    fn on_exchange(&mut self, sender: &str, dh: &DhMessage) -> Result<SessionEvent, SessionError> {
        let malformed = SessionError::MalformedExchange {
            step: dh.diffie_hellman_step,
        };
        match dh.diffie_hellman_step {
            1 => {
                let offer = dh.to_offer().ok_or(malformed)?;
                let (secret, reply) = diffie_hellman_step_2(&offer, &mut self.rng)?;
                self.cipher = Some(Kasumi::new(secret.key_material()));
                info!(peer = %sender, "session key established (responder)");
                Ok(SessionEvent::ExchangeReply(Envelope::new(
                    self.name.clone(),
                    sender,
                    MessageBody::DiffieHellman(DhMessage::reply(&reply)),
                )))
            }
            2 => {
                let reply = dh.to_reply().ok_or(malformed)?;
                let initiator = self.pending.take().ok_or(SessionError::NoPendingExchange)?;
                let secret = initiator.complete(&reply)?;
                self.cipher = Some(Kasumi::new(secret.key_material()));
                info!(peer = %sender, "session key established (initiator)");
                Ok(SessionEvent::KeyEstablished)
            }
            _ => Err(malformed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{ElGamalKeyPair, RsaKeyPair};
    use crate::crypto::numtheory::{find_prime, find_safe_prime};

    struct Pair {
        alice: SecureChannel,
        bob: SecureChannel,
        p: BigUint,
    }

    fn pair() -> Pair {
        let mut rng = Xorshift512::from_u64(42);
        let p = find_safe_prime(96, &mut rng, Some(5_000_000)).unwrap();
        let alice_key: KeyPair = ElGamalKeyPair::generate(&p, &mut rng).unwrap().into();
        let q1 = find_prime(160, &mut rng, Some(100_000)).unwrap();
        let q2 = find_prime(160, &mut rng, Some(100_000)).unwrap();
        let bob_key: KeyPair = RsaKeyPair::generate(&q1, &q2, &mut rng).unwrap().into();
        Pair {
            alice: SecureChannel::new("alice", "bob", alice_key, Xorshift512::from_u64(1)),
            bob: SecureChannel::new("bob", "alice", bob_key, Xorshift512::from_u64(2)),
            p,
        }
    }

    fn handshake(pair: &mut Pair) {
        let step1 = pair.alice.start_exchange(&pair.p).unwrap();
        let SessionEvent::ExchangeReply(step2) = pair.bob.handle(step1).unwrap() else {
            panic!("bob should answer step 1");
        };
        assert_eq!(pair.alice.handle(step2).unwrap(), SessionEvent::KeyEstablished);

        let init = pair.alice.announce_key();
        let SessionEvent::PeerKey { reply: Some(back) } = pair.bob.handle(init).unwrap() else {
            panic!("bob should announce back");
        };
        assert_eq!(
            pair.alice.handle(back).unwrap(),
            SessionEvent::PeerKey { reply: None }
        );
    }

    #[test]
    fn full_conversation() {
        let mut pair = pair();
        handshake(&mut pair);
        assert!(pair.alice.has_key() && pair.bob.has_key());

        let sealed = pair.alice.seal(b"hello bob").unwrap();
        match pair.bob.handle(sealed).unwrap() {
            SessionEvent::Message {
                sender,
                text,
                verified,
            } => {
                assert_eq!(sender, "alice");
                assert_eq!(text, b"hello bob");
                assert!(verified);
            }
            other => panic!("unexpected {other:?}"),
        }

        let sealed = pair.bob.seal(b"hi alice, twelve+ bytes").unwrap();
        let SessionEvent::Message { text, verified, .. } = pair.alice.handle(sealed).unwrap()
        else {
            panic!("expected a message");
        };
        assert_eq!(text, b"hi alice, twelve+ bytes");
        assert!(verified);
    }

    #[test]
    fn ciphertext_is_not_the_plaintext() {
        let mut pair = pair();
        handshake(&mut pair);
        let sealed = pair.alice.seal(b"attack at dawn").unwrap();
        let MessageBody::Data { data, data_size, .. } = &sealed.body else {
            panic!("expected data");
        };
        assert_eq!(*data_size, 14);
        let raw = STANDARD.decode(data).unwrap();
        assert_eq!(raw.len(), 16);
        assert_ne!(&raw[..14], b"attack at dawn");
    }

    #[test]
    fn tampered_ciphertext_fails_verification() {
        let mut pair = pair();
        handshake(&mut pair);
        let mut sealed = pair.alice.seal(b"pay bob 10").unwrap();
        if let MessageBody::Data { data, .. } = &mut sealed.body {
            let mut raw = STANDARD.decode(&*data).unwrap();
            raw[0] ^= 1;
            *data = STANDARD.encode(raw);
        }
        let SessionEvent::Message { verified, .. } = pair.bob.handle(sealed).unwrap() else {
            panic!("expected a message");
        };
        assert!(!verified);
    }

    #[test]
    fn sealing_needs_a_key() {
        let mut pair = pair();
        assert!(matches!(
            pair.alice.seal(b"too early"),
            Err(SessionError::NoSessionKey)
        ));
    }

    #[test]
    fn unsolicited_step_two_is_refused() {
        let mut pair = pair();
        let step1 = pair.alice.start_exchange(&pair.p).unwrap();
        let SessionEvent::ExchangeReply(step2) = pair.bob.handle(step1).unwrap() else {
            panic!("bob should answer step 1");
        };
        let mut stray = step2.clone();
        stray.receiver = "bob".into();
        assert!(matches!(
            pair.bob.handle(stray),
            Err(SessionError::NoPendingExchange)
        ));
        pair.alice.handle(step2).unwrap();
    }

    #[test]
    fn unknown_bodies_pass_through() {
        let mut pair = pair();
        let env = Envelope::new(
            "ledger",
            "alice",
            MessageBody::BalanceMessage {
                public_key_to_check: "x".into(),
                balance: Some(1.0),
            },
        );
        assert_eq!(
            pair.alice.handle(env.clone()).unwrap(),
            SessionEvent::Unhandled(env)
        );
    }
}
