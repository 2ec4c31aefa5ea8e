// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # cipherchain - Core Library
//!
//! A self-contained toolkit that builds a small cryptographic ledger from
//! first principles: number theory, a keystream generator, a sponge hash, a
//! Feistel block cipher, ElGamal and RSA signatures, Diffie-Hellman, and a
//! proof-of-work chain of signed transactions on top.
//!
//! None of the primitives here are standard-conformant or hardened. They
//! are textbook constructions, written to be read, and they interoperate
//! only with themselves.
//!
//! ## Architecture
//!
//! - **crypto** - PRNG, primes, RC4, sponge hash, Kasumi, modes, signatures,
//!   key exchange.
//! - **transaction** - Transaction type, signing and verification.
//! - **storage** - Blocks, mining, the blockchain and its JSON file.
//! - **network** - Framing, wire messages, the secure channel and the
//!   ledger service.
//! - **encoding** - serde helpers for big integers.
//! - **config** - Every constant in one place.
//!
//! ## Quick Tour
//!
//! ```no_run
//! use cipherchain::crypto::keys::{ElGamalKeyPair, KeyPair, SignatureScheme};
//! use cipherchain::crypto::numtheory::find_safe_prime;
//! use cipherchain::crypto::prng::Xorshift512;
//! use cipherchain::storage::Blockchain;
//! use cipherchain::transaction::{sign_transaction, Transaction};
//!
//! let mut rng = Xorshift512::from_entropy();
//! let p = find_safe_prime(128, &mut rng, None).unwrap();
//! let alice: KeyPair = ElGamalKeyPair::generate(&p, &mut rng).unwrap().into();
//!
//! let mut tx = Transaction::new(alice.identity(), "bob", 10.0);
//! sign_transaction(&mut tx, &alice, &mut rng).unwrap();
//!
//! let mut chain = Blockchain::new(SignatureScheme::ElGamal);
//! chain.accept_transaction(tx).unwrap();
//! assert!(chain.is_valid());
//! ```

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod network;
pub mod storage;
pub mod transaction;
