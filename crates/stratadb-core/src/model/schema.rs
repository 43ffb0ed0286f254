//! Module: model::schema
//! Responsibility: record schema declarations, the registry that resolves
//! schema ids, and structural validation of field shapes
//! Does not own: byte layout of keys and index entries (model::key,
//! model::index), value encoding (qualifier)
//! Boundary: ids are positions in the registry table; embeds may reference
//! forward, resolution is checked when the registry is finished

use crate::{
    error::{CodecError, ErrorOrigin},
    model::{FieldKind, FieldModel, IndexLayout, KeyLayout},
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// SchemaId
/// position of a schema in its registry
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SchemaId(usize);

impl SchemaId {
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// RecordSchema
/// a named record shape: numbered fields, key layout, secondary indexes
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldModel>,
    key: KeyLayout,
    indexes: Vec<IndexLayout>,
}

impl RecordSchema {
    /// Build a schema from its fields and key field order.
    ///
    /// Fields are stored sorted by property index. Shapes are validated
    /// structurally here; embed references resolve when the registry is
    /// finished.
    pub fn new(
        name: impl Into<String>,
        mut fields: Vec<FieldModel>,
        key_fields: &[u32],
    ) -> Result<Self, CodecError> {
        let name = name.into();

        if fields.is_empty() {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!("schema {name} has no fields"),
            ));
        }

        fields.sort_by_key(|f| f.index);
        for pair in fields.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!("schema {name} repeats field index {}", pair[0].index),
                ));
            }
        }

        for field in &fields {
            validate_kind(&name, field.index, &field.kind)?;

            if field.unique && !field.kind.is_scalar() {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!(
                        "schema {name} field {} is {}, unique needs a scalar",
                        field.index,
                        field.kind.label()
                    ),
                ));
            }
        }

        let key = KeyLayout::for_fields(&fields, key_fields)?;

        Ok(Self {
            name,
            fields,
            key,
            indexes: Vec::new(),
        })
    }

    /// Declare a secondary index over `component_fields`, in index order.
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        component_fields: &[u32],
        unique: bool,
    ) -> Result<Self, CodecError> {
        let layout = IndexLayout::for_fields(name, &self.fields, component_fields, unique)?;

        if self.indexes.iter().any(|i| i.name() == layout.name()) {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!("schema {} repeats index name {}", self.name, layout.name()),
            ));
        }

        self.indexes.push(layout);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields, ascending by property index.
    #[must_use]
    pub fn fields(&self) -> &[FieldModel] {
        &self.fields
    }

    /// Field by property index.
    #[must_use]
    pub fn field(&self, index: u32) -> Option<&FieldModel> {
        self.fields
            .binary_search_by_key(&index, |f| f.index)
            .ok()
            .map(|pos| &self.fields[pos])
    }

    /// Field by declared name; filters address fields this way.
    #[must_use]
    pub fn field_named(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field by property index, as a decode-side requirement.
    pub(crate) fn expect_field(
        &self,
        index: u32,
        origin: ErrorOrigin,
    ) -> Result<&FieldModel, CodecError> {
        self.field(index).ok_or_else(|| {
            CodecError::missing_definition(
                origin,
                format!("schema {} has no field {index}", self.name),
            )
        })
    }

    #[must_use]
    pub const fn key(&self) -> &KeyLayout {
        &self.key
    }

    #[must_use]
    pub fn indexes(&self) -> &[IndexLayout] {
        &self.indexes
    }

    /// Index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexLayout> {
        self.indexes.iter().find(|i| i.name() == name)
    }
}

// structural shape rules, applied to every nesting level
fn validate_kind(schema: &str, field: u32, kind: &FieldKind) -> Result<(), CodecError> {
    match kind {
        FieldKind::List(item) => validate_kind(schema, field, item),

        FieldKind::Set(item) => {
            if !item.is_scalar() {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!(
                        "schema {schema} field {field}: set items must be scalar, got {}",
                        item.label()
                    ),
                ));
            }
            Ok(())
        }

        FieldKind::Map { key, value } => {
            if !key.is_scalar() {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!(
                        "schema {schema} field {field}: map keys must be scalar, got {}",
                        key.label()
                    ),
                ));
            }
            validate_kind(schema, field, value)
        }

        FieldKind::Typed(variants) => {
            if variants.is_empty() {
                return Err(CodecError::unsupported_shape(
                    ErrorOrigin::Model,
                    format!("schema {schema} field {field}: typed field has no variants"),
                ));
            }

            for pair in variants.windows(2) {
                if pair[0].index >= pair[1].index {
                    return Err(CodecError::unsupported_shape(
                        ErrorOrigin::Model,
                        format!(
                            "schema {schema} field {field}: variant indexes must ascend, \
                             {} then {}",
                            pair[0].index, pair[1].index
                        ),
                    ));
                }
            }

            for variant in variants {
                if let Some(payload) = &variant.payload {
                    validate_kind(schema, field, payload)?;
                }
            }

            Ok(())
        }

        _ => Ok(()),
    }
}

///
/// SchemaRegistry
/// resolved table of schemas, addressed by id
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    schemas: Vec<RecordSchema>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder { slots: Vec::new() }
    }

    /// Schema for `id`, as a hard requirement.
    pub fn schema(&self, id: SchemaId) -> Result<&RecordSchema, CodecError> {
        self.get(id).ok_or_else(|| {
            CodecError::missing_definition(
                ErrorOrigin::Model,
                format!("registry has no schema {id}"),
            )
        })
    }

    #[must_use]
    pub fn get(&self, id: SchemaId) -> Option<&RecordSchema> {
        self.schemas.get(id.get())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &RecordSchema)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(pos, schema)| (SchemaId::new(pos), schema))
    }
}

///
/// SchemaRegistryBuilder
/// two-phase construction so embeds can reference schemas defined later
///

pub struct SchemaRegistryBuilder {
    slots: Vec<Option<RecordSchema>>,
}

impl SchemaRegistryBuilder {
    /// Claim an id before its schema exists.
    pub fn reserve(&mut self) -> SchemaId {
        self.slots.push(None);
        SchemaId::new(self.slots.len() - 1)
    }

    /// Fill a reserved id.
    pub fn define(&mut self, id: SchemaId, schema: RecordSchema) -> Result<(), CodecError> {
        let slot = self.slots.get_mut(id.get()).ok_or_else(|| {
            CodecError::missing_definition(
                ErrorOrigin::Model,
                format!("registry has no reserved slot {id}"),
            )
        })?;

        if slot.is_some() {
            return Err(CodecError::unsupported_shape(
                ErrorOrigin::Model,
                format!("schema slot {id} is already defined"),
            ));
        }

        *slot = Some(schema);
        Ok(())
    }

    /// Reserve and define in one step, for schemas without cycles.
    pub fn push(&mut self, schema: RecordSchema) -> SchemaId {
        self.slots.push(Some(schema));
        SchemaId::new(self.slots.len() - 1)
    }

    /// Check every slot is defined and every embed reference resolves.
    pub fn finish(self) -> Result<SchemaRegistry, CodecError> {
        let mut schemas = Vec::with_capacity(self.slots.len());
        for (pos, slot) in self.slots.into_iter().enumerate() {
            let schema = slot.ok_or_else(|| {
                CodecError::missing_definition(
                    ErrorOrigin::Model,
                    format!("schema slot {pos} was reserved but never defined"),
                )
            })?;
            schemas.push(schema);
        }

        for schema in &schemas {
            for field in schema.fields() {
                check_embeds(schema.name(), field.index, &field.kind, schemas.len())?;
            }
        }

        Ok(SchemaRegistry { schemas })
    }
}

// embed ids must land inside the finished table
fn check_embeds(
    schema: &str,
    field: u32,
    kind: &FieldKind,
    table_len: usize,
) -> Result<(), CodecError> {
    match kind {
        FieldKind::Embed(id) => {
            if id.get() >= table_len {
                return Err(CodecError::missing_definition(
                    ErrorOrigin::Model,
                    format!("schema {schema} field {field} embeds unknown schema {id}"),
                ));
            }
            Ok(())
        }

        FieldKind::List(item) | FieldKind::Set(item) => {
            check_embeds(schema, field, item, table_len)
        }

        FieldKind::Map { key, value } => {
            check_embeds(schema, field, key, table_len)?;
            check_embeds(schema, field, value, table_len)
        }

        FieldKind::Typed(variants) => {
            for variant in variants {
                if let Some(payload) = &variant.payload {
                    check_embeds(schema, field, payload, table_len)?;
                }
            }
            Ok(())
        }

        _ => Ok(()),
    }
}

///
/// TESTS
///
