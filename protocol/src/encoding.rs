//! # Serde Helpers for Big Integers
//!
//! JSON numbers are doubles as far as most parsers are concerned, which is
//! about 460 bits short of a 512-bit prime. Every `BigUint` that crosses a
//! serialization boundary goes through these helpers and is written as a
//! decimal string. Plain JSON integers are accepted on the way in so small
//! hand-written values still load.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Group {
//!     #[serde(with = "crate::encoding::decimal")]
//!     p: BigUint,
//! }
//! ```

/// `BigUint` <-> decimal string.
pub mod decimal {
    use std::fmt;

    use num_bigint::BigUint;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = BigUint;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer as a decimal string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
            BigUint::parse_bytes(v.as_bytes(), 10)
                .ok_or_else(|| E::custom(format!("invalid decimal integer: {v:?}")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
            Ok(BigUint::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
            u64::try_from(v)
                .map(BigUint::from)
                .map_err(|_| E::custom(format!("negative integer: {v}")))
        }
    }
}

/// `Option<BigUint>` <-> optional decimal string. Pair with
/// `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod decimal_option {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::decimal")] BigUint);

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::decimal::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(v)| v))
    }
}
