use derive_more::{Deref, From};
use serde::{Deserialize, Serialize, Serializer, de::Deserializer};
use std::fmt;
use thiserror::Error as ThisError;
use ulid::Ulid as WrappedUlid;

///
/// UlidDecodeError
///

#[derive(Debug, ThisError)]
pub enum UlidDecodeError {
    #[error("invalid ulid length: {len} bytes")]
    InvalidSize { len: usize },

    #[error("invalid ulid string")]
    InvalidString,
}

///
/// Ulid
///
/// Identifier scalar keyed by timestamp then randomness, so the big-endian
/// byte form is already creation-ordered.
///

#[derive(Clone, Copy, Debug, Deref, Eq, From, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Ulid(WrappedUlid);

impl Ulid {
    pub const STORED_SIZE: usize = 16;

    pub const MIN: Self = Self::from_bytes([0x00; 16]);
    pub const MAX: Self = Self::from_bytes([0xFF; 16]);

    #[must_use]
    pub const fn nil() -> Self {
        Self(WrappedUlid::nil())
    }

    #[must_use]
    pub const fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(WrappedUlid::from_parts(timestamp_ms, random))
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(WrappedUlid::from_bytes(bytes))
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0.to_bytes()
    }

    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, UlidDecodeError> {
        if bytes.len() != Self::STORED_SIZE {
            return Err(UlidDecodeError::InvalidSize { len: bytes.len() });
        }

        let mut array = [0u8; 16];
        array.copy_from_slice(bytes);

        Ok(Self::from_bytes(array))
    }

    pub fn from_string(encoded: &str) -> Result<Self, UlidDecodeError> {
        WrappedUlid::from_string(encoded)
            .map(Self)
            .map_err(|_| UlidDecodeError::InvalidString)
    }

    #[must_use]
    pub const fn from_u128(n: u128) -> Self {
        Self(WrappedUlid::from_bytes(n.to_be_bytes()))
    }
}

impl fmt::Display for Ulid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// The ulid crate's serde impls are gated behind its `serde` feature, which
// drags in features this workspace disables. Serialize as the canonical
// Crockford string instead.
impl Serialize for Ulid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Ulid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::from_string(&raw).map_err(|_| serde::de::Error::custom("invalid ulid string"))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip_preserves_identity() {
        let id = Ulid::from_parts(1_700_000_000_000, 0x1234_5678_9abc_def0);
        let bytes = id.to_bytes();
        assert_eq!(Ulid::try_from_bytes(&bytes).unwrap(), id);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let err = Ulid::try_from_bytes(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, UlidDecodeError::InvalidSize { len: 7 }));
    }

    #[test]
    fn byte_order_tracks_value_order() {
        let lo = Ulid::from_parts(10, 0);
        let hi = Ulid::from_parts(11, 0);
        assert!(lo < hi);
        assert!(lo.to_bytes() < hi.to_bytes());
    }
}
