//! # Key Pairs & Identities
//!
//! Two signature schemes live side by side: ElGamal over a safe-prime group
//! and textbook RSA. A participant's ledger identity is simply the decimal
//! concatenation of their public-key components:
//!
//! - ElGamal: `p || alpha || h`
//! - RSA: `n || e`
//!
//! Identities are opaque strings as far as the ledger is concerned. Two
//! keys that happen to concatenate to the same digits would share an
//! account; with 512-bit components that is not a practical worry.
//!
//! Secret halves (`x`, `d`) never show up in `Debug` output.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::numtheory::{
    fast_exponentiation, find_generator, mod_inverse, passes_trial_division, rabin_miller_test,
};
use super::prng::Xorshift512;
use super::signatures::{el_gamal_sign, rsa_sign, Signature, SignatureError};
use crate::config::MILLER_RABIN_ITERATIONS;
use crate::encoding::decimal;

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

/// Which signature scheme a key, signature or ledger uses. The serialized
/// names are the wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    #[serde(rename = "El_gamal")]
    ElGamal,
    #[serde(rename = "RSA")]
    Rsa,
}

impl SignatureScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ElGamal => "El_gamal",
            Self::Rsa => "RSA",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(&['-', '_'][..], "").as_str() {
            "elgamal" => Ok(Self::ElGamal),
            "rsa" => Ok(Self::Rsa),
            _ => Err(SignatureError::UnknownScheme(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ElGamal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalPublicKey {
    #[serde(with = "decimal")]
    pub p: BigUint,
    #[serde(with = "decimal")]
    pub alpha: BigUint,
    #[serde(with = "decimal")]
    pub h: BigUint,
}

impl ElGamalPublicKey {
    pub fn identity(&self) -> String {
        format!("{}{}{}", self.p, self.alpha, self.h)
    }
}

/// ElGamal key pair. Invariant: `h = alpha^x mod p`.
///
/// Key files are loaded through [`ElGamalKeyPair::from_parts`], so the
/// invariant holds for deserialized keys too.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawElGamalKeyPair")]
pub struct ElGamalKeyPair {
    pub public: ElGamalPublicKey,
    #[serde(with = "decimal")]
    x: BigUint,
}

#[derive(Deserialize)]
struct RawElGamalKeyPair {
    public: ElGamalPublicKey,
    #[serde(with = "decimal")]
    x: BigUint,
}

impl TryFrom<RawElGamalKeyPair> for ElGamalKeyPair {
    type Error = SignatureError;

    fn try_from(raw: RawElGamalKeyPair) -> Result<Self, Self::Error> {
        Self::from_parts(raw.public, raw.x)
    }
}

impl ElGamalKeyPair {
    /// Build a key pair in the group of the safe prime `p`: the smallest
    /// generator becomes `alpha` and `x` is drawn from `[1, p - 2]`.
    pub fn generate(p: &BigUint, rng: &mut Xorshift512) -> Result<Self, SignatureError> {
        let alpha = find_generator(p).ok_or_else(|| SignatureError::NoGenerator { p: p.clone() })?;
        let x = rng.gen_range(&BigUint::one(), &(p - 2u32));
        let h = fast_exponentiation(&alpha, &x, p);
        info!(bits = p.bits(), "generated ElGamal key pair");
        Ok(Self {
            public: ElGamalPublicKey {
                p: p.clone(),
                alpha,
                h,
            },
            x,
        })
    }

    /// Reassemble a key pair, checking `p >= 3` and `h = alpha^x mod p`.
    pub fn from_parts(public: ElGamalPublicKey, x: BigUint) -> Result<Self, SignatureError> {
        if public.p < BigUint::from(3u32) {
            return Err(SignatureError::ModulusTooSmall { modulus: public.p });
        }
        if fast_exponentiation(&public.alpha, &x, &public.p) != public.h {
            return Err(SignatureError::InconsistentKey);
        }
        Ok(Self { public, x })
    }

    pub fn private_exponent(&self) -> &BigUint {
        &self.x
    }
}

impl fmt::Debug for ElGamalKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElGamalKeyPair")
            .field("public", &self.public)
            .field("x", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RSA
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPublicKey {
    #[serde(with = "decimal")]
    pub n: BigUint,
    #[serde(with = "decimal")]
    pub e: BigUint,
}

impl RsaPublicKey {
    pub fn identity(&self) -> String {
        format!("{}{}", self.n, self.e)
    }
}

/// RSA key pair. Invariant: `e * d = 1 mod phi(n)`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawRsaKeyPair")]
pub struct RsaKeyPair {
    pub public: RsaPublicKey,
    #[serde(with = "decimal")]
    d: BigUint,
}

#[derive(Deserialize)]
struct RawRsaKeyPair {
    public: RsaPublicKey,
    #[serde(with = "decimal")]
    d: BigUint,
}

impl TryFrom<RawRsaKeyPair> for RsaKeyPair {
    type Error = SignatureError;

    fn try_from(raw: RawRsaKeyPair) -> Result<Self, Self::Error> {
        Self::from_parts(raw.public, raw.d)
    }
}

impl RsaKeyPair {
    /// Build a key pair from two distinct primes.
    ///
    /// `e` is a probable prime below `phi` that is coprime with it, found by
    /// walking odd numbers from a random start (wrapping back to 3).
    pub fn generate(
        p: &BigUint,
        q: &BigUint,
        rng: &mut Xorshift512,
    ) -> Result<Self, SignatureError> {
        let three = BigUint::from(3u32);
        if p == q || *p < three || *q < three {
            return Err(SignatureError::InvalidPrimes);
        }

        let n = p * q;
        let phi = (p - 1u32) * (q - 1u32);

        let mut e = rng.gen_range(&three, &(&phi - 1u32));
        if e.is_even() {
            e += 1u32;
        }
        loop {
            if e >= phi {
                e = three.clone();
            }
            if passes_trial_division(&e)
                && rabin_miller_test(&e, MILLER_RABIN_ITERATIONS, rng)
                && e.gcd(&phi).is_one()
            {
                break;
            }
            e += 2u32;
        }

        let d = mod_inverse(&e, &phi).ok_or(SignatureError::InvalidPrimes)?;
        info!(bits = n.bits(), "generated RSA key pair");
        Ok(Self {
            public: RsaPublicKey { n, e },
            d,
        })
    }

    /// Reassemble a key pair, checking that `d` undoes `e` on a probe value.
    pub fn from_parts(public: RsaPublicKey, d: BigUint) -> Result<Self, SignatureError> {
        let probe = BigUint::from(2u32);
        if public.n <= probe {
            return Err(SignatureError::ModulusTooSmall { modulus: public.n });
        }
        let round_trip = fast_exponentiation(
            &fast_exponentiation(&probe, &public.e, &public.n),
            &d,
            &public.n,
        );
        if round_trip != probe {
            return Err(SignatureError::InconsistentKey);
        }
        Ok(Self { public, d })
    }

    pub fn private_exponent(&self) -> &BigUint {
        &self.d
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public", &self.public)
            .field("d", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Sum Types
// ---------------------------------------------------------------------------

/// Either kind of public key, tagged by `signature_type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signature_type")]
pub enum PublicKey {
    #[serde(rename = "El_gamal")]
    ElGamal(ElGamalPublicKey),
    #[serde(rename = "RSA")]
    Rsa(RsaPublicKey),
}

impl PublicKey {
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::ElGamal(_) => SignatureScheme::ElGamal,
            Self::Rsa(_) => SignatureScheme::Rsa,
        }
    }

    pub fn identity(&self) -> String {
        match self {
            Self::ElGamal(key) => key.identity(),
            Self::Rsa(key) => key.identity(),
        }
    }
}

/// Either kind of key pair. This is the shape of a key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "signature_type")]
pub enum KeyPair {
    #[serde(rename = "El_gamal")]
    ElGamal(ElGamalKeyPair),
    #[serde(rename = "RSA")]
    Rsa(RsaKeyPair),
}

impl KeyPair {
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::ElGamal(_) => SignatureScheme::ElGamal,
            Self::Rsa(_) => SignatureScheme::Rsa,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::ElGamal(pair) => PublicKey::ElGamal(pair.public.clone()),
            Self::Rsa(pair) => PublicKey::Rsa(pair.public.clone()),
        }
    }

    pub fn identity(&self) -> String {
        match self {
            Self::ElGamal(pair) => pair.public.identity(),
            Self::Rsa(pair) => pair.public.identity(),
        }
    }

    /// Sign with whichever scheme this key belongs to. RSA ignores `rng`.
    pub fn sign(&self, message: &[u8], rng: &mut Xorshift512) -> Signature {
        match self {
            Self::ElGamal(pair) => Signature::ElGamal(el_gamal_sign(pair, message, rng)),
            Self::Rsa(pair) => Signature::Rsa(rsa_sign(pair, message)),
        }
    }
}

impl From<ElGamalKeyPair> for KeyPair {
    fn from(pair: ElGamalKeyPair) -> Self {
        Self::ElGamal(pair)
    }
}

impl From<RsaKeyPair> for KeyPair {
    fn from(pair: RsaKeyPair) -> Self {
        Self::Rsa(pair)
    }
}
