//! # Diffie-Hellman Key Exchange
//!
//! Three-step finite-field Diffie-Hellman over a safe-prime group. The
//! shared secret's low 128 bits become the [`Kasumi`](super::kasumi::Kasumi)
//! session key.
//!
//! ## Protocol Flow
//!
//! 1. The initiator picks `r`, finds the smallest generator `alpha` of
//!    `Z_p*` and sends `(p, alpha, A = alpha^r)`.
//! 2. The responder picks `s`, computes the secret `A^s` and sends back
//!    `B = alpha^s`.
//! 3. The initiator computes the same secret as `B^r`.
//!
//! The initiator's exponent lives in a [`DhInitiator`] that step 3 consumes,
//! so it cannot be reused for a second exchange.
//!
//! Nothing here authenticates the peer. The session layer signs every
//! message it sends, which is what keeps a man in the middle from quietly
//! swapping `A` or `B`.

use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::kasumi::KeyMaterial;
use super::numtheory::{fast_exponentiation, find_generator};
use super::prng::Xorshift512;
use crate::encoding::decimal;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("no generator of Z_p* found for p = {p}")]
    NoGenerator { p: BigUint },

    #[error("peer public value is outside [1, p - 1]")]
    InvalidPublicValue,
}

/// Step 1 message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhOffer {
    #[serde(with = "decimal")]
    pub p: BigUint,
    #[serde(with = "decimal")]
    pub alpha: BigUint,
    #[serde(rename = "A", with = "decimal")]
    pub a: BigUint,
}

/// Step 2 message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhReply {
    #[serde(rename = "B", with = "decimal")]
    pub b: BigUint,
}

/// The initiator's half-finished exchange.
pub struct DhInitiator {
    p: BigUint,
    r: BigUint,
}

impl fmt::Debug for DhInitiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhInitiator")
            .field("p", &self.p)
            .field("r", &"[REDACTED]")
            .finish()
    }
}

/// `alpha^(r*s) mod p`, known to both sides after step 3.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(BigUint);

impl SharedSecret {
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial::from_secret(&self.0)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

fn check_public_value(value: &BigUint, p: &BigUint) -> Result<(), ExchangeError> {
    if value.is_zero() || value >= p {
        return Err(ExchangeError::InvalidPublicValue);
    }
    Ok(())
}

/// Step 1: open an exchange in the group of `p`.
pub fn diffie_hellman_step_1(
    p: &BigUint,
    rng: &mut Xorshift512,
) -> Result<(DhOffer, DhInitiator), ExchangeError> {
    let alpha = find_generator(p).ok_or_else(|| ExchangeError::NoGenerator { p: p.clone() })?;
    let r = rng.gen_range(&BigUint::one(), &(p - 1u32));
    let a = fast_exponentiation(&alpha, &r, p);
    debug!(bits = p.bits(), "diffie-hellman step 1");
    Ok((
        DhOffer {
            p: p.clone(),
            alpha,
            a,
        },
        DhInitiator { p: p.clone(), r },
    ))
}

/// Step 2: answer an offer. The responder is done after this call.
pub fn diffie_hellman_step_2(
    offer: &DhOffer,
    rng: &mut Xorshift512,
) -> Result<(SharedSecret, DhReply), ExchangeError> {
    check_public_value(&offer.a, &offer.p)?;
    check_public_value(&offer.alpha, &offer.p)?;
    let s = rng.gen_range(&BigUint::one(), &(&offer.p - 1u32));
    let secret = fast_exponentiation(&offer.a, &s, &offer.p);
    let b = fast_exponentiation(&offer.alpha, &s, &offer.p);
    debug!(bits = offer.p.bits(), "diffie-hellman step 2");
    Ok((SharedSecret(secret), DhReply { b }))
}

impl DhInitiator {
    /// Step 3: finish with the responder's reply.
    pub fn complete(self, reply: &DhReply) -> Result<SharedSecret, ExchangeError> {
        check_public_value(&reply.b, &self.p)?;
        debug!(bits = self.p.bits(), "diffie-hellman step 3");
        Ok(SharedSecret(fast_exponentiation(&reply.b, &self.r, &self.p)))
    }
}
