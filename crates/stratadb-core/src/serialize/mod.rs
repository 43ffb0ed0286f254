mod cbor;

use crate::error::{CodecError, ErrorClass, ErrorOrigin};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error as ThisError;

/// Generic CBOR serialization infrastructure.
///
/// This module is format-level only:
/// - No engine-layer policy limits are defined here beyond `MAX_CELL_BYTES`.
/// - Callers that need a tighter bound must pass explicit limits.

/// Largest serialized cell accepted by the default `deserialize`.
pub const MAX_CELL_BYTES: usize = 1024 * 1024;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("deserialize size limit exceeded: {len} bytes (limit {max_bytes})")]
    DeserializeSizeLimitExceeded { len: usize, max_bytes: usize },
}

///
/// SerializeErrorKind
///
/// Stable error-kind taxonomy for serializer failures.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SerializeErrorKind {
    Serialize,
    Deserialize,
    DeserializeSizeLimitExceeded,
}

impl SerializeErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serialize => "serialize",
            Self::Deserialize => "deserialize",
            Self::DeserializeSizeLimitExceeded => "deserialize_size_limit_exceeded",
        }
    }
}

impl fmt::Display for SerializeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SerializeError {
    /// Return a stable error kind independent of backend error-message text.
    #[must_use]
    pub const fn kind(&self) -> SerializeErrorKind {
        match self {
            Self::Serialize(_) => SerializeErrorKind::Serialize,
            Self::Deserialize(_) => SerializeErrorKind::Deserialize,
            Self::DeserializeSizeLimitExceeded { .. } => {
                SerializeErrorKind::DeserializeSizeLimitExceeded
            }
        }
    }
}

impl From<SerializeError> for CodecError {
    fn from(err: SerializeError) -> Self {
        Self::new(ErrorClass::Serialize, ErrorOrigin::Serialize, err.to_string())
    }
}

/// Serialize a value using the crate's cell codec.
pub fn serialize<T>(ty: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    cbor::serialize(ty)
}

/// Deserialize a value produced by [`serialize`], bounded by
/// [`MAX_CELL_BYTES`].
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize_bounded(bytes, MAX_CELL_BYTES)
}

/// Deserialize a value produced by [`serialize`], with an explicit size limit.
///
/// Size limits are caller policy, not serialization-format policy.
pub fn deserialize_bounded<T>(bytes: &[u8], max_bytes: usize) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize_bounded(bytes, max_bytes)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        qualifier::{CellValue, StorageEntry, StorageKind},
        value::Value,
    };

    #[test]
    fn cell_values_survive_the_cell_codec() {
        let cell = CellValue::Typed {
            variant: 2,
            value: Some(Value::Text("inline".to_string())),
        };

        let bytes = serialize(&cell).expect("serialize should succeed");
        let back: CellValue = deserialize(&bytes).expect("deserialize should succeed");
        assert_eq!(back, cell);
    }

    #[test]
    fn storage_entries_survive_the_cell_codec() {
        let entry = StorageEntry::new(
            vec![0x09, 0x00, 0x00, 0x00, 0x01],
            StorageKind::Value,
            CellValue::Scalar(Value::Int(-40)),
        );

        let bytes = serialize(&entry).expect("serialize should succeed");
        let back: StorageEntry = deserialize(&bytes).expect("deserialize should succeed");
        assert_eq!(back, entry);
    }

    #[test]
    fn oversized_payload_is_rejected_before_decode() {
        let bytes = serialize(&Value::Uint(9)).expect("serialize should succeed");

        let err = deserialize_bounded::<Value>(&bytes, 1)
            .expect_err("a one byte limit should reject the payload");
        assert_eq!(err.kind(), SerializeErrorKind::DeserializeSizeLimitExceeded);
    }

    #[test]
    fn garbage_bytes_report_a_deserialize_kind() {
        let err = deserialize::<Value>(&[0xFF, 0xFF, 0xFF])
            .expect_err("garbage bytes should not decode");
        assert_eq!(err.kind(), SerializeErrorKind::Deserialize);
    }

    #[test]
    fn serialize_errors_convert_into_codec_errors() {
        let err: CodecError = SerializeError::Deserialize("bad tag".to_string()).into();
        assert_eq!(err.class, ErrorClass::Serialize);
        assert_eq!(err.origin, ErrorOrigin::Serialize);
    }
}
