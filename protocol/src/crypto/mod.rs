//! # Cryptographic Primitives for cipherchain
//!
//! Everything the ledger and the secure channel are built from, bottom-up:
//!
//! - **prng** - 512-bit xorshift. Reproducible, not cryptographic.
//! - **numtheory** - modexp, extended Euclid, Miller-Rabin, safe primes,
//!   generators.
//! - **rc4** - keystream generator with a configurable state length.
//! - **hash** - sponge hash built on an RC4-keyed bit permutation.
//! - **kasumi** - 8-round Feistel block cipher in the KASUMI shape.
//! - **encryption** - ECB, CBC, PCBC and CTR over the block cipher.
//! - **keys** / **signatures** - ElGamal and RSA over the sponge digest.
//! - **exchange** - three-step Diffie-Hellman.
//!
//! ## A note on "rolling your own crypto"
//!
//! This module does exactly that, on purpose, and it shows. Every primitive
//! here is a readable, testable implementation of a textbook construction.
//! None of it is constant-time, the hash is a toy, RSA has no padding. Use
//! it to learn how the pieces fit together, not to protect anything.

pub mod encryption;
pub mod exchange;
pub mod hash;
pub mod kasumi;
pub mod keys;
pub mod numtheory;
pub mod prng;
pub mod rc4;
pub mod signatures;

// Re-export the things people actually need so they don't have to memorize
// the module hierarchy.
pub use encryption::{cipher_message, decipher_message, decrypt, encrypt, ChainingMode};
pub use exchange::{diffie_hellman_step_1, diffie_hellman_step_2, DhInitiator, SharedSecret};
pub use hash::{sponge_hash, sponge_hash_hex, SpongeHash};
pub use kasumi::{Kasumi, KeyMaterial};
pub use keys::{KeyPair, PublicKey, SignatureScheme};
pub use prng::Xorshift512;
pub use rc4::Rc4;
pub use signatures::{sign, verify, Signature};
