//! Module: model::key
//! Responsibility: primary key layout, fixed-width parts joined by separator
//! bytes, and encoding record key values into ordered byte strings
//! Does not own: which fields form the key (model::schema), range folding
//! over parts (scan::planner)
//! Boundary: offsets and sizes published here are the single source of truth
//! for key byte positions

use crate::{
    MAX_KEY_PARTS,
    error::{CodecError, ErrorOrigin},
    model::{FieldKind, FieldModel},
    value::Value,
};
use serde::{Deserialize, Serialize};

/// Byte written between adjacent key parts.
///
/// Scan bounds lean on the gap around it: 0 sorts before any separated
/// continuation and 2 sorts after every one.
pub const KEY_PART_SEPARATOR: u8 = 1;

///
/// KeyPart
/// one fixed-width slice of the primary key
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPart {
    /// property index of the backing field
    pub field: u32,

    /// scalar kind of the backing field
    pub kind: FieldKind,

    /// stored width in bytes, separator excluded
    pub size: usize,

    /// byte offset within the whole key, separators included
    pub offset: usize,
}

///
/// KeyLayout
/// byte positions of every key part within an encoded key
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyLayout {
    parts: Vec<KeyPart>,
    total_size: usize,
}

impl KeyLayout {
    /// Build the layout for `key_fields`, in key order.
    ///
    /// Every named field must exist in `fields` and carry a fixed storage
    /// width. At most [`MAX_KEY_PARTS`] parts are allowed.
    pub(crate) fn for_fields(
        fields: &[FieldModel],
        key_fields: &[u32],
    ) -> Result<Self, CodecError> {
        if key_fields.is_empty() {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                "key needs at least one part",
            ));
        }
        if key_fields.len() > MAX_KEY_PARTS {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!(
                    "key has {} parts, limit is {MAX_KEY_PARTS}",
                    key_fields.len()
                ),
            ));
        }

        let mut parts = Vec::with_capacity(key_fields.len());
        let mut offset = 0;

        for &field_index in key_fields {
            if parts.iter().any(|p: &KeyPart| p.field == field_index) {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!("key repeats field {field_index}"),
                ));
            }

            let field = fields
                .iter()
                .find(|f| f.index == field_index)
                .ok_or_else(|| {
                    CodecError::missing_definition(
                        ErrorOrigin::Model,
                        format!("key field {field_index} is not defined"),
                    )
                })?;

            let size = field.kind.fixed_width().ok_or_else(|| {
                CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!(
                        "key field {field_index} ({}) has no fixed width",
                        field.kind.label()
                    ),
                )
            })?;

            parts.push(KeyPart {
                field: field_index,
                kind: field.kind.clone(),
                size,
                offset,
            });

            offset += size + 1;
        }

        Ok(Self {
            parts,
            total_size: offset - 1,
        })
    }

    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Full key width in bytes, separators included.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        self.total_size
    }

    /// Part position and layout entry for a property index.
    #[must_use]
    pub fn part_for_field(&self, field: u32) -> Option<(usize, &KeyPart)> {
        self.parts
            .iter()
            .enumerate()
            .find(|(_, part)| part.field == field)
    }

    /// Encode one part's value into its storage bytes.
    pub fn encode_part(&self, position: usize, value: &Value) -> Result<Vec<u8>, CodecError> {
        let part = self.parts.get(position).ok_or_else(|| {
            CodecError::missing_definition(
                ErrorOrigin::Model,
                format!("key has no part {position}"),
            )
        })?;

        if !part.kind.accepts(value) {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!(
                    "key part {position} is {}, value is {}",
                    part.kind.label(),
                    value.variant_label()
                ),
            ));
        }

        value.storage_bytes().ok_or_else(|| {
            CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!("key part {position} value has no storage bytes"),
            )
        })
    }

    /// Encode a full key from its part values, in part order.
    pub fn encode_key(&self, values: &[Value]) -> Result<Vec<u8>, CodecError> {
        if values.len() != self.parts.len() {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!(
                    "key expects {} values, got {}",
                    self.parts.len(),
                    values.len()
                ),
            ));
        }

        let mut out = Vec::with_capacity(self.total_size);
        for (position, value) in values.iter().enumerate() {
            if position > 0 {
                out.push(KEY_PART_SEPARATOR);
            }
            out.extend_from_slice(&self.encode_part(position, value)?);
        }

        Ok(out)
    }
}

///
/// TESTS
///
