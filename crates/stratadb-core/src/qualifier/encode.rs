//! Module: qualifier::encode
//! Responsibility: walk a materialized record and emit every storage cell it
//! occupies, qualifiers ascending
//! Does not own: cell persistence (the sink), qualifier parsing
//! (qualifier::decode)
//! Boundary: emission order matches qualifier byte order so sinks can stream
//! into ordered storage without a sort

use crate::{
    error::{CodecError, ErrorOrigin},
    model::{FieldKind, SchemaId, SchemaRegistry},
    obs::{self, CodecEvent},
    qualifier::{
        CellValue, StorageEntry, StorageKind,
        segment::{DELETE_MARKER, RefTag, push_segment},
    },
    value::{Record, Value, push_length_prefix},
};

/// Emit every storage entry for `record` into `sink`.
///
/// The record's fields are visited in ascending property index order and
/// every container is emitted size marker first, so entries arrive in
/// qualifier byte order.
pub fn encode_record<F>(
    registry: &SchemaRegistry,
    schema: SchemaId,
    record: &Record,
    sink: &mut F,
) -> Result<(), CodecError>
where
    F: FnMut(StorageEntry) -> Result<(), CodecError>,
{
    obs::record(CodecEvent::EncodePass);

    encode_fields(registry, schema, record, &[], sink)
}

/// Collect every storage entry for `record`.
pub fn encode_entries(
    registry: &SchemaRegistry,
    schema: SchemaId,
    record: &Record,
) -> Result<Vec<StorageEntry>, CodecError> {
    let mut entries = Vec::new();
    encode_record(registry, schema, record, &mut |entry| {
        entries.push(entry);
        Ok(())
    })?;

    Ok(entries)
}

/// Reference-type tag a field of `kind` carries in its path segment.
pub(super) const fn shape_tag(kind: &FieldKind) -> RefTag {
    match kind {
        FieldKind::List(_) => RefTag::List,
        FieldKind::Set(_) => RefTag::Set,
        FieldKind::Map { .. } => RefTag::Map,
        FieldKind::Embed(_) => RefTag::Embed,
        FieldKind::Typed(_) => RefTag::Type,
        _ => RefTag::Value,
    }
}

// One record level: delete marker first, then fields ascending.
fn encode_fields<F>(
    registry: &SchemaRegistry,
    schema_id: SchemaId,
    record: &Record,
    prefix: &[u8],
    sink: &mut F,
) -> Result<(), CodecError>
where
    F: FnMut(StorageEntry) -> Result<(), CodecError>,
{
    let schema = registry.schema(schema_id)?;

    if record.soft_deleted() {
        let mut qualifier = prefix.to_vec();
        push_segment(&mut qualifier, 0, RefTag::Special);
        qualifier.push(DELETE_MARKER);

        sink(StorageEntry::new(
            qualifier,
            StorageKind::ObjectDelete,
            CellValue::Scalar(Value::Bool(true)),
        ))?;
    }

    for (&index, value) in record.iter() {
        let field = schema.expect_field(index, ErrorOrigin::Encode)?;

        let mut qualifier = prefix.to_vec();
        push_segment(&mut qualifier, index, shape_tag(&field.kind));

        encode_shaped(registry, &field.kind, qualifier, value, sink)?;
    }

    Ok(())
}

// One value at its cell position; `qualifier` already addresses it.
fn encode_shaped<F>(
    registry: &SchemaRegistry,
    kind: &FieldKind,
    qualifier: Vec<u8>,
    value: &Value,
    sink: &mut F,
) -> Result<(), CodecError>
where
    F: FnMut(StorageEntry) -> Result<(), CodecError>,
{
    match kind {
        FieldKind::List(item) => {
            let Value::List(items) = value else {
                return Err(shape_mismatch(kind, value));
            };

            sink(StorageEntry::new(
                qualifier.clone(),
                StorageKind::ListSize,
                CellValue::Count(container_len(items.len())?),
            ))?;

            for (position, item_value) in (0u32..).zip(items) {
                if !item.accepts(item_value) {
                    return Err(item_mismatch("list", item, item_value));
                }

                let mut item_qualifier = qualifier.clone();
                item_qualifier.extend_from_slice(&position.to_be_bytes());

                sink(StorageEntry::new(
                    item_qualifier,
                    StorageKind::Value,
                    CellValue::Scalar(item_value.clone()),
                ))?;
            }

            Ok(())
        }

        FieldKind::Set(item) => {
            let Value::Set(items) = value else {
                return Err(shape_mismatch(kind, value));
            };

            sink(StorageEntry::new(
                qualifier.clone(),
                StorageKind::SetSize,
                CellValue::Count(container_len(items.len())?),
            ))?;

            // items of one scalar kind sort identically by value and by
            // storage bytes, so canonical set order is emission order
            for item_value in items {
                if !item.accepts(item_value) {
                    return Err(item_mismatch("set", item, item_value));
                }

                let bytes = item_value.storage_bytes().ok_or_else(|| {
                    item_mismatch("set", item, item_value)
                })?;

                let mut item_qualifier = qualifier.clone();
                item_qualifier.extend_from_slice(&bytes);

                // the item rides in the qualifier; the cell only marks it live
                sink(StorageEntry::new(
                    item_qualifier,
                    StorageKind::Value,
                    CellValue::Scalar(Value::Unit),
                ))?;
            }

            Ok(())
        }

        FieldKind::Map { key, value: value_kind } => {
            let Value::Map(entries) = value else {
                return Err(shape_mismatch(kind, value));
            };

            sink(StorageEntry::new(
                qualifier.clone(),
                StorageKind::MapSize,
                CellValue::Count(container_len(entries.len())?),
            ))?;

            // canonical map order is not byte order once keys differ in
            // length; re-sort by the length-prefixed key bytes
            let mut keyed = Vec::with_capacity(entries.len());
            for (entry_key, entry_value) in entries {
                if !key.accepts(entry_key) {
                    return Err(item_mismatch("map key", key, entry_key));
                }

                let bytes = entry_key.storage_bytes().ok_or_else(|| {
                    item_mismatch("map key", key, entry_key)
                })?;

                let mut suffix = Vec::with_capacity(bytes.len() + 2);
                push_length_prefix(&mut suffix, bytes.len());
                suffix.extend_from_slice(&bytes);

                keyed.push((suffix, entry_value));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));

            for (suffix, entry_value) in keyed {
                let mut entry_qualifier = qualifier.clone();
                entry_qualifier.extend_from_slice(&suffix);

                encode_shaped(registry, value_kind, entry_qualifier, entry_value, sink)?;
            }

            Ok(())
        }

        FieldKind::Embed(id) => {
            let Value::Embed(embedded) = value else {
                return Err(shape_mismatch(kind, value));
            };

            sink(StorageEntry::new(
                qualifier.clone(),
                StorageKind::Embed,
                CellValue::Scalar(Value::Unit),
            ))?;

            encode_fields(registry, *id, embedded, &qualifier, sink)
        }

        FieldKind::Typed(variants) => {
            let Value::Typed { variant, value: payload } = value else {
                return Err(shape_mismatch(kind, value));
            };

            let definition = variants
                .iter()
                .find(|v| v.index == *variant)
                .ok_or_else(|| {
                    CodecError::missing_definition(
                        ErrorOrigin::Encode,
                        format!("typed field has no variant {variant}"),
                    )
                })?;

            match &definition.payload {
                None => {
                    if !matches!(payload.as_ref(), Value::Unit) {
                        return Err(CodecError::unsupported_shape(
                            ErrorOrigin::Encode,
                            format!(
                                "variant {} carries no payload, value is {}",
                                definition.name,
                                payload.variant_label()
                            ),
                        ));
                    }

                    sink(StorageEntry::new(
                        qualifier,
                        StorageKind::TypeValue,
                        CellValue::Typed {
                            variant: *variant,
                            value: None,
                        },
                    ))
                }

                Some(payload_kind) if payload_kind.is_scalar() => {
                    if !payload_kind.accepts(payload) {
                        return Err(item_mismatch("variant payload", payload_kind, payload));
                    }

                    sink(StorageEntry::new(
                        qualifier,
                        StorageKind::TypeValue,
                        CellValue::Typed {
                            variant: *variant,
                            value: Some(payload.as_ref().clone()),
                        },
                    ))
                }

                Some(payload_kind) => {
                    // complex payload: discriminator marker first, payload
                    // cells under the variant's type segment
                    sink(StorageEntry::new(
                        qualifier.clone(),
                        StorageKind::TypeValue,
                        CellValue::Typed {
                            variant: *variant,
                            value: None,
                        },
                    ))?;

                    let mut payload_qualifier = qualifier;
                    push_segment(&mut payload_qualifier, *variant, RefTag::Type);

                    encode_shaped(registry, payload_kind, payload_qualifier, payload, sink)
                }
            }
        }

        _ => {
            if !kind.accepts(value) {
                return Err(shape_mismatch(kind, value));
            }

            sink(StorageEntry::new(
                qualifier,
                StorageKind::Value,
                CellValue::Scalar(value.clone()),
            ))
        }
    }
}

fn container_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| {
        CodecError::unsupported_shape(ErrorOrigin::Encode, "container length exceeds 32 bits")
    })
}

fn shape_mismatch(kind: &FieldKind, value: &Value) -> CodecError {
    CodecError::unsupported_shape(
        ErrorOrigin::Encode,
        format!(
            "field value is {}, schema expects {}",
            value.variant_label(),
            kind.label()
        ),
    )
}

fn item_mismatch(position: &str, kind: &FieldKind, value: &Value) -> CodecError {
    CodecError::unsupported_shape(
        ErrorOrigin::Encode,
        format!(
            "{position} must be {}, got {}",
            kind.label(),
            value.variant_label()
        ),
    )
}

///
/// TESTS
///
