//! Module: model::index
//! Responsibility: secondary index entry layout, length-prefixed components
//! followed by the raw primary key
//! Does not own: which indexes a schema declares (model::schema), matcher
//! evaluation against entries (scan::matcher)
//! Boundary: entries are self-describing, every component can be located by
//! walking its length prefixes alone

use crate::{
    error::{CodecError, ErrorOrigin},
    model::{FieldKind, FieldModel},
    value::{Value, push_length_prefix, read_ordered_varint},
};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Range};

///
/// ComponentWidth
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ComponentWidth {
    /// value bytes always occupy this many bytes
    Fixed(usize),

    /// value bytes vary per entry, the length prefix is authoritative
    Variable,
}

///
/// IndexComponent
/// one indexed property within an entry
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexComponent {
    /// property index of the indexed field
    pub field: u32,

    /// scalar kind of the indexed field
    pub kind: FieldKind,

    /// value width class
    pub width: ComponentWidth,
}

///
/// IndexLayout
/// ordering and framing of one secondary index's entries
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexLayout {
    name: String,
    components: Vec<IndexComponent>,
    unique: bool,
}

impl IndexLayout {
    /// Build the layout for `component_fields`, in index order.
    ///
    /// Indexed fields must exist and be scalar.
    pub(crate) fn for_fields(
        name: impl Into<String>,
        fields: &[FieldModel],
        component_fields: &[u32],
        unique: bool,
    ) -> Result<Self, CodecError> {
        let name = name.into();

        if component_fields.is_empty() {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!("index {name} needs at least one component"),
            ));
        }

        let mut components = Vec::with_capacity(component_fields.len());
        for &field_index in component_fields {
            if components.iter().any(|c: &IndexComponent| c.field == field_index) {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!("index {name} repeats field {field_index}"),
                ));
            }

            let field = fields
                .iter()
                .find(|f| f.index == field_index)
                .ok_or_else(|| {
                    CodecError::missing_definition(
                        ErrorOrigin::Model,
                        format!("index {name} field {field_index} is not defined"),
                    )
                })?;

            if !field.kind.is_scalar() {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!(
                        "index {name} field {field_index} is {}, only scalars index",
                        field.kind.label()
                    ),
                ));
            }

            let width = match field.kind.fixed_width() {
                Some(size) => ComponentWidth::Fixed(size),
                None => ComponentWidth::Variable,
            };

            components.push(IndexComponent {
                field: field_index,
                kind: field.kind.clone(),
                width,
            });
        }

        Ok(Self {
            name,
            components,
            unique,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn components(&self) -> &[IndexComponent] {
        &self.components
    }

    #[must_use]
    pub const fn unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Slot position and component for a property index.
    #[must_use]
    pub fn component_for_field(&self, field: u32) -> Option<(usize, &IndexComponent)> {
        self.components
            .iter()
            .enumerate()
            .find(|(_, component)| component.field == field)
    }

    /// Encode one slot's value as it appears inside an entry, length
    /// prefix included.
    pub fn encode_component(&self, slot: usize, value: &Value) -> Result<Vec<u8>, CodecError> {
        let component = self.components.get(slot).ok_or_else(|| {
            CodecError::missing_definition(
                ErrorOrigin::Model,
                format!("index {} has no slot {slot}", self.name),
            )
        })?;

        if !component.kind.accepts(value) {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!(
                    "index {} slot {slot} is {}, value is {}",
                    self.name,
                    component.kind.label(),
                    value.variant_label()
                ),
            ));
        }

        let bytes = value.storage_bytes().ok_or_else(|| {
            CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!("index {} slot {slot} value has no storage bytes", self.name),
            )
        })?;

        let mut out = Vec::with_capacity(bytes.len() + 2);
        push_length_prefix(&mut out, bytes.len());
        out.extend_from_slice(&bytes);

        Ok(out)
    }

    /// Encode a whole entry: every component in slot order, then the raw
    /// primary key bytes.
    pub fn encode_entry(&self, values: &[Value], key: &[u8]) -> Result<Vec<u8>, CodecError> {
        if values.len() != self.components.len() {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!(
                    "index {} expects {} values, got {}",
                    self.name,
                    self.components.len(),
                    values.len()
                ),
            ));
        }

        let mut out = Vec::new();
        for (slot, value) in values.iter().enumerate() {
            out.extend_from_slice(&self.encode_component(slot, value)?);
        }
        out.extend_from_slice(key);

        Ok(out)
    }

    /// Byte range of a slot's value within an entry, length prefix
    /// excluded. `None` when the entry is truncated before the slot.
    #[must_use]
    pub fn locate_slot(&self, entry: &[u8], slot: usize) -> Option<Range<usize>> {
        if slot >= self.components.len() {
            return None;
        }

        let mut pos = 0;
        for current in 0..=slot {
            let (len, consumed) = read_ordered_varint(entry.get(pos..)?)?;
            let start = pos + consumed;
            let end = start + usize::try_from(len).ok()?;

            if end > entry.len() {
                return None;
            }
            if current == slot {
                return Some(start..end);
            }

            pos = end;
        }

        None
    }
}

impl fmt::Display for IndexLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "UNIQUE ")?;
        }

        let fields = self
            .components
            .iter()
            .map(|c| c.field.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        write!(f, "{}({fields})", self.name)
    }
}

///
/// TESTS
///
