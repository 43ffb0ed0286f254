//! Module: model::field
//! Responsibility: per-field shape declarations and fixed-width scalar decoding
//! Does not own: field numbering or key membership (model::schema), qualifier
//! segment layout (qualifier::segment)
//! Boundary: values produced here are plain `Value` scalars; container kinds
//! delegate item handling to the qualifier codec

use crate::{
    error::{CodecError, ErrorOrigin},
    value::{Float64, Ulid, Value, f64_from_ordered, i32_from_ordered, i64_from_ordered},
};
use serde::{Deserialize, Serialize};

///
/// FieldModel
/// one named, numbered property of a record schema
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldModel {
    /// property index, unique within the schema
    pub index: u32,

    /// field name
    pub name: String,

    /// shape of the stored value
    pub kind: FieldKind,

    /// declared unique, eligible for single-value lookups
    pub unique: bool,
}

impl FieldModel {
    #[must_use]
    pub fn new(index: u32, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
            unique: false,
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

///
/// FieldKind
/// the closed set of shapes a field can take
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    // scalar
    Bool,
    Int32,
    Int,
    Uint,
    Float,
    Text,
    Bytes,
    Ulid,

    // container
    List(Box<FieldKind>),
    Set(Box<FieldKind>),
    Map {
        key: Box<FieldKind>,
        value: Box<FieldKind>,
    },

    // structured
    Embed(super::SchemaId),
    Typed(Vec<TypeVariant>),
}

impl FieldKind {
    /// Shorthand for a map kind without spelling the boxes.
    #[must_use]
    pub fn map(key: Self, value: Self) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Shorthand for a list kind.
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    /// Shorthand for a set kind.
    #[must_use]
    pub fn set(item: Self) -> Self {
        Self::Set(Box::new(item))
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int32
                | Self::Int
                | Self::Uint
                | Self::Float
                | Self::Text
                | Self::Bytes
                | Self::Ulid
        )
    }

    /// Whether `value` is a scalar of this kind. Container and structured
    /// kinds accept nothing here; their values never occupy a single slot.
    #[must_use]
    pub const fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Bool, Value::Bool(_))
                | (Self::Int32, Value::Int32(_))
                | (Self::Int, Value::Int(_))
                | (Self::Uint, Value::Uint(_))
                | (Self::Float, Value::Float(_))
                | (Self::Text, Value::Text(_))
                | (Self::Bytes, Value::Bytes(_))
                | (Self::Ulid, Value::Ulid(_))
        )
    }

    /// Storage width of the kind when it is fixed, `None` for
    /// variable-length and non-scalar kinds.
    #[must_use]
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Int32 => Some(4),
            Self::Int | Self::Uint | Self::Float => Some(8),
            Self::Ulid => Some(Ulid::STORED_SIZE),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Ulid => "ulid",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map { .. } => "map",
            Self::Embed(_) => "embed",
            Self::Typed(_) => "typed",
        }
    }

    /// Decode a scalar value from its order-preserving storage bytes.
    ///
    /// The slice must hold exactly one value of this kind; trailing bytes
    /// are malformed. Container and structured kinds cannot be read from a
    /// single byte run.
    pub(crate) fn read_storage_bytes(
        &self,
        bytes: &[u8],
        origin: ErrorOrigin,
    ) -> Result<Value, CodecError> {
        let width_err = || {
            CodecError::malformed_qualifier(
                origin,
                format!("{} value has invalid byte length {}", self.label(), bytes.len()),
            )
        };

        match self {
            Self::Bool => match bytes {
                [0] => Ok(Value::Bool(false)),
                [1] => Ok(Value::Bool(true)),
                [_] => Err(CodecError::malformed_qualifier(
                    origin,
                    "bool value byte is neither 0 nor 1",
                )),
                _ => Err(width_err()),
            },

            Self::Int32 => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| width_err())?;
                Ok(Value::Int32(i32_from_ordered(raw)))
            }

            Self::Int => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| width_err())?;
                Ok(Value::Int(i64_from_ordered(raw)))
            }

            Self::Uint => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| width_err())?;
                Ok(Value::Uint(u64::from_be_bytes(raw)))
            }

            Self::Float => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| width_err())?;
                let float = Float64::try_new(f64_from_ordered(raw)).ok_or_else(|| {
                    CodecError::malformed_qualifier(origin, "float value is not finite")
                })?;

                Ok(Value::Float(float))
            }

            Self::Text => match core::str::from_utf8(bytes) {
                Ok(text) => Ok(Value::Text(text.to_string())),
                Err(_) => Err(CodecError::malformed_qualifier(
                    origin,
                    "text value is not valid utf-8",
                )),
            },

            Self::Bytes => Ok(Value::Bytes(bytes.to_vec())),

            Self::Ulid => {
                let ulid = Ulid::try_from_bytes(bytes).map_err(|_| width_err())?;
                Ok(Value::Ulid(ulid))
            }

            Self::List(_) | Self::Set(_) | Self::Map { .. } | Self::Embed(_) | Self::Typed(_) => {
                Err(CodecError::unsupported_shape(
                    origin,
                    format!("{} field cannot be read from a single byte run", self.label()),
                ))
            }
        }
    }
}

///
/// TypeVariant
/// one alternative of a typed field, carrying an optional payload shape
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeVariant {
    /// variant index, strictly ascending within the field
    pub index: u32,

    /// variant name
    pub name: String,

    /// payload shape, `None` for bare discriminator variants
    pub payload: Option<FieldKind>,
}

impl TypeVariant {
    #[must_use]
    pub fn new(index: u32, name: impl Into<String>, payload: Option<FieldKind>) -> Self {
        Self {
            index,
            name: name.into(),
            payload,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_widths_cover_every_scalar() {
        assert_eq!(FieldKind::Bool.fixed_width(), Some(1));
        assert_eq!(FieldKind::Int32.fixed_width(), Some(4));
        assert_eq!(FieldKind::Int.fixed_width(), Some(8));
        assert_eq!(FieldKind::Uint.fixed_width(), Some(8));
        assert_eq!(FieldKind::Float.fixed_width(), Some(8));
        assert_eq!(FieldKind::Ulid.fixed_width(), Some(16));
        assert_eq!(FieldKind::Text.fixed_width(), None);
        assert_eq!(FieldKind::Bytes.fixed_width(), None);
        assert_eq!(FieldKind::list(FieldKind::Int).fixed_width(), None);
    }

    #[test]
    fn read_rejects_wrong_width() {
        let err = FieldKind::Int
            .read_storage_bytes(&[0x80, 0x00], ErrorOrigin::Decode)
            .unwrap_err();

        assert!(err.to_string().contains("invalid byte length"));
    }

    #[test]
    fn read_rejects_container_kinds() {
        let kind = FieldKind::set(FieldKind::Text);
        let err = kind
            .read_storage_bytes(&[1, 2, 3], ErrorOrigin::Decode)
            .unwrap_err();

        assert!(err.to_string().contains("single byte run"));
    }

    #[test]
    fn scalar_reads_invert_storage_writes() {
        let cases = vec![
            (FieldKind::Bool, Value::Bool(true)),
            (FieldKind::Int32, Value::Int32(-7)),
            (FieldKind::Int, Value::Int(-40_000)),
            (FieldKind::Uint, Value::Uint(u64::MAX)),
            (FieldKind::Text, Value::Text("storage".to_string())),
            (FieldKind::Bytes, Value::Bytes(vec![0, 255, 3])),
        ];

        for (kind, value) in cases {
            let bytes = value.storage_bytes().unwrap();
            let back = kind.read_storage_bytes(&bytes, ErrorOrigin::Decode).unwrap();

            assert_eq!(back, value);
        }
    }
}
