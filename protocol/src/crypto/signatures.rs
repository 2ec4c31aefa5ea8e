//! # Digital Signatures
//!
//! ElGamal and RSA signing over the sponge digest. Both schemes sign
//! `H(m)`, the 32-byte sponge hash of the message read as a little-endian
//! integer.
//!
//! ## ElGamal
//!
//! With key `(p, alpha, h = alpha^x)` and a fresh `y` coprime with `p - 1`:
//!
//! ```text
//! s1 = alpha^y mod p
//! s2 = y^-1 * (H(m) - x * s1) mod (p - 1)
//! ```
//!
//! and a signature verifies iff `h^s1 * s1^s2 = alpha^H(m) mod p`.
//!
//! Reusing `y` across two messages leaks `x`. Every call draws a new one.
//!
//! ## RSA
//!
//! Textbook: `sig = H(m)^d mod n`, valid iff `sig^e mod n = H(m)`. No
//! padding, and `H(m)` is compared as-is, so the modulus must exceed
//! `2^256` for anything to verify.
//!
//! Verification returns `bool`. Callers that want a reason wrap it (the
//! transaction layer does).

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::hash::SpongeHash;
use super::keys::{ElGamalKeyPair, ElGamalPublicKey, KeyPair, PublicKey, RsaKeyPair, RsaPublicKey, SignatureScheme};
use super::numtheory::{fast_exponentiation, mod_inverse};
use super::prng::Xorshift512;
use crate::encoding::decimal;

/// Key construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no generator of Z_p* found for p = {p}")]
    NoGenerator { p: BigUint },

    #[error("RSA needs two distinct primes, both at least 3")]
    InvalidPrimes,

    #[error("private exponent does not match the public key")]
    InconsistentKey,

    #[error("modulus {modulus} is too small, need at least 3")]
    ModulusTooSmall { modulus: BigUint },

    #[error("unknown signature scheme: {0}")]
    UnknownScheme(String),
}

// ---------------------------------------------------------------------------
// Signature Values
// ---------------------------------------------------------------------------

/// ElGamal signature pair. On the wire: `["<s1>", "<s2>"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElGamalSignature {
    pub s1: BigUint,
    pub s2: BigUint,
}

#[derive(Serialize, Deserialize)]
struct SignaturePair(
    #[serde(with = "decimal")] BigUint,
    #[serde(with = "decimal")] BigUint,
);

impl Serialize for ElGamalSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SignaturePair(self.s1.clone(), self.s2.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ElGamalSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let SignaturePair(s1, s2) = SignaturePair::deserialize(deserializer)?;
        Ok(Self { s1, s2 })
    }
}

/// RSA signature. On the wire: a single decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RsaSignature(#[serde(with = "decimal")] pub BigUint);

/// Either kind of signature. The JSON shapes differ (array vs. string), so
/// no tag is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signature {
    ElGamal(ElGamalSignature),
    Rsa(RsaSignature),
}

impl Signature {
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::ElGamal(_) => SignatureScheme::ElGamal,
            Self::Rsa(_) => SignatureScheme::Rsa,
        }
    }
}

fn message_digest(message: &[u8]) -> BigUint {
    SpongeHash::default().digest_integer(message)
}

// ---------------------------------------------------------------------------
// ElGamal
// ---------------------------------------------------------------------------

pub fn el_gamal_sign(
    keypair: &ElGamalKeyPair,
    message: &[u8],
    rng: &mut Xorshift512,
) -> ElGamalSignature {
    let public = &keypair.public;
    let p_minus_one = &public.p - 1u32;
    let y_high = &public.p - 2u32;

    let (y, y_inverse) = loop {
        let y = rng.gen_range(&BigUint::one(), &y_high);
        if let Some(inverse) = mod_inverse(&y, &p_minus_one) {
            break (y, inverse);
        }
    };

    let s1 = fast_exponentiation(&public.alpha, &y, &public.p);

    let order = BigInt::from(p_minus_one);
    let digest = BigInt::from(message_digest(message));
    let x_s1 = BigInt::from(keypair.private_exponent() * &s1);
    let s2 = (BigInt::from(y_inverse) * (digest - x_s1)).mod_floor(&order);

    ElGamalSignature {
        s1,
        s2: s2.magnitude().clone(),
    }
}

pub fn el_gamal_verify(
    public: &ElGamalPublicKey,
    signature: &ElGamalSignature,
    message: &[u8],
) -> bool {
    let p = &public.p;
    if *p < BigUint::from(3u32) || signature.s1.is_zero() || signature.s1 >= *p {
        return false;
    }
    let digest = message_digest(message);
    let lhs = fast_exponentiation(&public.h, &signature.s1, p)
        * fast_exponentiation(&signature.s1, &signature.s2, p)
        % p;
    lhs == fast_exponentiation(&public.alpha, &digest, p)
}

// ---------------------------------------------------------------------------
// RSA
// ---------------------------------------------------------------------------

pub fn rsa_sign(keypair: &RsaKeyPair, message: &[u8]) -> RsaSignature {
    let public = &keypair.public;
    RsaSignature(fast_exponentiation(
        &message_digest(message),
        keypair.private_exponent(),
        &public.n,
    ))
}

pub fn rsa_verify(public: &RsaPublicKey, signature: &RsaSignature, message: &[u8]) -> bool {
    fast_exponentiation(&signature.0, &public.e, &public.n) == message_digest(message)
}

// ---------------------------------------------------------------------------
// Scheme-agnostic entry points
// ---------------------------------------------------------------------------

pub fn sign(keypair: &KeyPair, message: &[u8], rng: &mut Xorshift512) -> Signature {
    keypair.sign(message, rng)
}

/// Verify `signature` over `message`. A signature from the other scheme
/// never verifies.
pub fn verify(public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
    match (public_key, signature) {
        (PublicKey::ElGamal(key), Signature::ElGamal(sig)) => el_gamal_verify(key, sig, message),
        (PublicKey::Rsa(key), Signature::Rsa(sig)) => rsa_verify(key, sig, message),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::numtheory::{find_prime, find_safe_prime};

    fn el_gamal_pair(seed: u64) -> (ElGamalKeyPair, Xorshift512) {
        let mut rng = Xorshift512::from_u64(seed);
        let p = find_safe_prime(128, &mut rng, Some(5_000_000)).unwrap();
        let pair = ElGamalKeyPair::generate(&p, &mut rng).unwrap();
        (pair, rng)
    }

    fn rsa_pair(seed: u64) -> RsaKeyPair {
        let mut rng = Xorshift512::from_u64(seed);
        let p = find_prime(160, &mut rng, Some(100_000)).unwrap();
        let q = find_prime(160, &mut rng, Some(100_000)).unwrap();
        RsaKeyPair::generate(&p, &q, &mut rng).unwrap()
    }

    #[test]
    fn el_gamal_sign_and_verify() {
        let (pair, mut rng) = el_gamal_pair(1);
        let sig = el_gamal_sign(&pair, b"pay bob 10", &mut rng);
        assert!(el_gamal_verify(&pair.public, &sig, b"pay bob 10"));
    }

    #[test]
    fn el_gamal_rejects_other_message() {
        let (pair, mut rng) = el_gamal_pair(2);
        let sig = el_gamal_sign(&pair, b"pay bob 10", &mut rng);
        assert!(!el_gamal_verify(&pair.public, &sig, b"pay bob 11"));
    }

    #[test]
    fn el_gamal_rejects_tampered_signature() {
        let (pair, mut rng) = el_gamal_pair(3);
        let mut sig = el_gamal_sign(&pair, b"msg", &mut rng);
        sig.s2 += 1u32;
        assert!(!el_gamal_verify(&pair.public, &sig, b"msg"));
    }

    #[test]
    fn el_gamal_rejects_out_of_range_s1() {
        let (pair, mut rng) = el_gamal_pair(4);
        let mut sig = el_gamal_sign(&pair, b"msg", &mut rng);
        sig.s1 = BigUint::zero();
        assert!(!el_gamal_verify(&pair.public, &sig, b"msg"));
        sig.s1 = pair.public.p.clone();
        assert!(!el_gamal_verify(&pair.public, &sig, b"msg"));
    }

    #[test]
    fn el_gamal_signatures_are_randomized() {
        let (pair, mut rng) = el_gamal_pair(5);
        let a = el_gamal_sign(&pair, b"same", &mut rng);
        let b = el_gamal_sign(&pair, b"same", &mut rng);
        assert_ne!(a, b);
        assert!(el_gamal_verify(&pair.public, &a, b"same"));
        assert!(el_gamal_verify(&pair.public, &b, b"same"));
    }

    #[test]
    fn rsa_sign_and_verify() {
        let pair = rsa_pair(6);
        assert!(pair.public.n.bits() > 256);
        let sig = rsa_sign(&pair, b"pay alice 4");
        assert!(rsa_verify(&pair.public, &sig, b"pay alice 4"));
        assert!(!rsa_verify(&pair.public, &sig, b"pay alice 5"));
    }

    #[test]
    fn rsa_rejects_tampered_signature() {
        let pair = rsa_pair(10);
        let mut sig = rsa_sign(&pair, b"pay alice 4");
        sig.0 += 1u32;
        assert!(!rsa_verify(&pair.public, &sig, b"pay alice 4"));
    }

    #[test]
    fn rsa_rejects_other_modulus() {
        let pair = rsa_pair(11);
        let other = rsa_pair(12);
        assert_ne!(pair.public.n, other.public.n);
        let sig = rsa_sign(&pair, b"pay alice 4");
        let foreign = RsaPublicKey {
            n: other.public.n.clone(),
            e: pair.public.e.clone(),
        };
        assert!(!rsa_verify(&foreign, &sig, b"pay alice 4"));
        assert!(!rsa_verify(&other.public, &sig, b"pay alice 4"));
    }

    #[test]
    fn rsa_is_deterministic() {
        let pair = rsa_pair(7);
        assert_eq!(rsa_sign(&pair, b"m"), rsa_sign(&pair, b"m"));
    }

    #[test]
    fn scheme_mismatch_never_verifies() {
        let (el_gamal, mut rng) = el_gamal_pair(8);
        let rsa = rsa_pair(9);
        let el_gamal_key = KeyPair::from(el_gamal);
        let rsa_key = KeyPair::from(rsa);

        let sig = sign(&rsa_key, b"m", &mut rng);
        assert_eq!(sig.scheme(), SignatureScheme::Rsa);
        assert!(verify(&rsa_key.public_key(), &sig, b"m"));
        assert!(!verify(&el_gamal_key.public_key(), &sig, b"m"));
    }

    #[test]
    fn wire_shapes() {
        let el_gamal = Signature::ElGamal(ElGamalSignature {
            s1: BigUint::from(12u32),
            s2: BigUint::from(34u32),
        });
        let rsa = Signature::Rsa(RsaSignature(BigUint::from(56u32)));
        assert_eq!(serde_json::to_string(&el_gamal).unwrap(), r#"["12","34"]"#);
        assert_eq!(serde_json::to_string(&rsa).unwrap(), r#""56""#);

        let back: Signature = serde_json::from_str(r#"["12","34"]"#).unwrap();
        assert_eq!(back, el_gamal);
        let back: Signature = serde_json::from_str(r#""56""#).unwrap();
        assert_eq!(back, rsa);
    }
}
