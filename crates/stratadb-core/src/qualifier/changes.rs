//! Module: qualifier::changes
//! Responsibility: replay a strictly ascending qualifier stream as ordered,
//! per-version change groups instead of a single materialized record.
//! Does not own: cell storage (the `ChangeSource`), record reconstruction
//! (qualifier::decode).
//! Boundary: routing and cache discipline are identical to the decode pass;
//! only the leaf interpretation differs.

use crate::{
    error::{CodecError, ErrorOrigin},
    model::{FieldKind, SchemaId, SchemaRegistry},
    obs::{self, CodecEvent},
    qualifier::{
        CellValue, ChangeSource, PathStep, PropertyPath, Qualifier, Selection, StorageKind,
        decode::{CacheEntry, DecodeCache, RouteAction},
        encode::shape_tag,
        segment::{DELETE_MARKER, LIST_INDEX_SIZE, MAP_KEY_MARKER, RefTag, read_segment},
    },
    value::{Value, read_ordered_varint},
};
use serde::{Deserialize, Serialize};

///
/// VersionedChanges
/// One version's worth of decoded changes; lists are ordered by version
/// ascending and each group keeps its changes in stream order.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VersionedChanges {
    pub version: u64,
    pub changes: Vec<RecordChange>,
}

///
/// RecordChange
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RecordChange {
    ValueSet { path: PropertyPath, value: Value },
    ValueDeleted { path: PropertyPath },
    SetItemsAdded { path: PropertyPath, items: Vec<Value> },
    TypeSwitched { path: PropertyPath, variant: u32 },
    SoftDeleted { deleted: bool },
}

/// Replay `source` as version-grouped changes.
///
/// Qualifiers must arrive in strictly ascending byte order, the same
/// contract as [`decode_record`](crate::qualifier::decode_record).
/// `selection` prunes subtrees; unselected qualifiers are skipped without a
/// cell read.
pub fn decode_changes<S>(
    registry: &SchemaRegistry,
    schema: SchemaId,
    source: &mut S,
    selection: &Selection,
) -> Result<Vec<VersionedChanges>, CodecError>
where
    S: ChangeSource,
{
    obs::record(CodecEvent::ChangePass);

    let mut pass = ChangePass {
        registry,
        schema,
        source,
        log: ChangeLog::default(),
        cache: DecodeCache::new(true),
    };
    pass.run(selection)?;

    Ok(pass.log.groups)
}

///
/// ChangeLog
/// Version-indexed accumulator; groups stay sorted by version.
///

#[derive(Default)]
struct ChangeLog {
    groups: Vec<VersionedChanges>,
}

impl ChangeLog {
    fn group_mut(&mut self, version: u64) -> &mut VersionedChanges {
        match self.groups.binary_search_by_key(&version, |g| g.version) {
            Ok(found) => &mut self.groups[found],
            Err(slot) => {
                self.groups.insert(
                    slot,
                    VersionedChanges {
                        version,
                        changes: Vec::new(),
                    },
                );
                &mut self.groups[slot]
            }
        }
    }

    fn push(&mut self, version: u64, change: RecordChange) {
        self.group_mut(version).changes.push(change);
    }

    /// Set additions coalesce into one accumulating change per target set
    /// within a version group.
    fn push_set_item(&mut self, version: u64, path: &PropertyPath, item: Value) {
        let group = self.group_mut(version);
        for change in &mut group.changes {
            if let RecordChange::SetItemsAdded {
                path: existing,
                items,
            } = change
                && existing == path
            {
                items.push(item);
                return;
            }
        }

        group.changes.push(RecordChange::SetItemsAdded {
            path: path.clone(),
            items: vec![item],
        });
    }
}

// Route data cloned out of the cache so the pass can borrow it mutably.
enum Dispatch {
    Discard,
    Route {
        depth: usize,
        path: PropertyPath,
        kind: FieldKind,
        selection: Selection,
    },
    Cold,
}

///
/// ChangePass
/// scan-local state for one change replay
///

struct ChangePass<'a, S> {
    registry: &'a SchemaRegistry,
    schema: SchemaId,
    source: &'a mut S,
    log: ChangeLog,
    cache: DecodeCache,
}

impl<S> ChangePass<'_, S>
where
    S: ChangeSource,
{
    fn run(&mut self, selection: &Selection) -> Result<(), CodecError> {
        let mut previous: Option<Qualifier> = None;

        while let Some(qualifier) = self.source.next_qualifier() {
            let shared = match &previous {
                Some(prev) => {
                    if qualifier.as_bytes() <= prev.as_bytes() {
                        return Err(CodecError::malformed_qualifier(
                            ErrorOrigin::Changes,
                            "qualifier stream is not strictly ascending",
                        ));
                    }
                    prev.shared_prefix_len(qualifier.as_bytes())
                }
                None => 0,
            };

            self.cache.evict_diverged(shared);

            let dispatch = match self.cache.top() {
                Some(CacheEntry {
                    action: RouteAction::Discard,
                    ..
                }) => Dispatch::Discard,
                Some(CacheEntry {
                    depth,
                    action:
                        RouteAction::Decode {
                            path,
                            kind,
                            selection,
                        },
                }) => Dispatch::Route {
                    depth: *depth,
                    path: path.clone(),
                    kind: kind.clone(),
                    selection: selection.clone(),
                },
                None => Dispatch::Cold,
            };

            match dispatch {
                Dispatch::Discard => {
                    obs::record(CodecEvent::QualifierRouted { cache_hit: true });
                }
                Dispatch::Route {
                    depth,
                    path,
                    kind,
                    selection,
                } => {
                    obs::record(CodecEvent::QualifierRouted { cache_hit: true });
                    self.change_shaped(&kind, &path, qualifier.as_bytes(), depth, &selection)?;
                }
                Dispatch::Cold => {
                    obs::record(CodecEvent::QualifierRouted { cache_hit: false });
                    self.change_root(qualifier.as_bytes(), selection)?;
                }
            }

            previous = Some(qualifier);
        }

        Ok(())
    }

    fn change_root(&mut self, qualifier: &[u8], selection: &Selection) -> Result<(), CodecError> {
        let (segment, consumed) = read_segment(qualifier, ErrorOrigin::Changes)?;

        if segment.tag == RefTag::Special {
            return self.apply_special(qualifier, consumed, true);
        }

        let schema = self.registry.schema(self.schema)?;
        let field = schema.expect_field(segment.property, ErrorOrigin::Changes)?;

        let Some(sub) = selection.narrow(segment.property) else {
            self.cache.install_skip(consumed);
            return Ok(());
        };

        if shape_tag(&field.kind) != segment.tag {
            return Err(CodecError::malformed_qualifier(
                ErrorOrigin::Changes,
                format!(
                    "segment tag {} does not match the {} field shape",
                    segment.tag,
                    field.kind.label()
                ),
            ));
        }

        self.change_shaped(
            &field.kind,
            &PropertyPath::root(segment.property),
            qualifier,
            consumed,
            sub,
        )
    }

    // One value position, change-mode leaf semantics.
    #[expect(clippy::too_many_lines)]
    fn change_shaped(
        &mut self,
        kind: &FieldKind,
        path: &PropertyPath,
        qualifier: &[u8],
        pos: usize,
        selection: &Selection,
    ) -> Result<(), CodecError> {
        let at_end = pos == qualifier.len();

        match kind {
            FieldKind::List(item) => {
                if at_end {
                    return self.open_container(StorageKind::ListSize, kind, path, qualifier, selection);
                }

                if !item.is_scalar() {
                    return Err(CodecError::unimplemented(
                        ErrorOrigin::Changes,
                        "change replay of list items holding container or embedded values",
                    ));
                }

                let end = pos + LIST_INDEX_SIZE;
                if end != qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "list item suffix must be exactly four index bytes",
                    ));
                }
                let raw: [u8; LIST_INDEX_SIZE] = qualifier[pos..end]
                    .try_into()
                    .map_err(|_| {
                        CodecError::malformed_qualifier(
                            ErrorOrigin::Changes,
                            "list item index is truncated",
                        )
                    })?;
                let index = u32::from_be_bytes(raw);

                self.scalar_leaf(item, &path.child(PathStep::ListItem(index)))
            }

            FieldKind::Set(item) => {
                if at_end {
                    return self.open_container(StorageKind::SetSize, kind, path, qualifier, selection);
                }

                let item_value = item.read_storage_bytes(&qualifier[pos..], ErrorOrigin::Changes)?;

                // a live cell is an addition; a versioned clear of the
                // liveness cell carries no addition to report
                let (version, cell) = self.source.read_versioned_cell(StorageKind::Value, item)?;
                if cell.is_some() {
                    self.log.push_set_item(version, path, item_value);
                }
                Ok(())
            }

            FieldKind::Map { key, value } => {
                if at_end {
                    return self.open_container(StorageKind::MapSize, kind, path, qualifier, selection);
                }

                let (len, consumed) = read_ordered_varint(&qualifier[pos..]).ok_or_else(|| {
                    CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "map key length prefix is unreadable",
                    )
                })?;
                let len = usize::try_from(len).map_err(|_| {
                    CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "map key length exceeds the address space",
                    )
                })?;

                let start = pos + consumed;
                let end = start + len;
                if end > qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "map key bytes are truncated",
                    ));
                }

                if !value.is_scalar() {
                    return Err(CodecError::unimplemented(
                        ErrorOrigin::Changes,
                        "change replay of map values holding container or embedded values",
                    ));
                }
                if end != qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "qualifier continues past a scalar map value",
                    ));
                }

                let key_value = key.read_storage_bytes(&qualifier[start..end], ErrorOrigin::Changes)?;

                self.scalar_leaf(value, &path.child(PathStep::MapKey(key_value)))
            }

            FieldKind::Embed(id) => {
                if at_end {
                    let (_, cell) = self.source.read_versioned_cell(StorageKind::Embed, kind)?;
                    return match cell {
                        Some(_) => {
                            self.cache.install_route(
                                qualifier.len(),
                                path.clone(),
                                kind.clone(),
                                selection.clone(),
                            );
                            Ok(())
                        }
                        None => Err(CodecError::unimplemented(
                            ErrorOrigin::Changes,
                            "embedded record deletion propagation in change streams",
                        )),
                    };
                }

                let (segment, consumed) = read_segment(&qualifier[pos..], ErrorOrigin::Changes)?;
                if segment.tag == RefTag::Special {
                    return self.apply_special(qualifier, pos + consumed, false);
                }

                let schema = self.registry.schema(*id)?;
                let field = schema.expect_field(segment.property, ErrorOrigin::Changes)?;

                let Some(sub) = selection.narrow(segment.property) else {
                    self.cache.install_skip(pos + consumed);
                    return Ok(());
                };

                if shape_tag(&field.kind) != segment.tag {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        format!(
                            "segment tag {} does not match the {} field shape",
                            segment.tag,
                            field.kind.label()
                        ),
                    ));
                }

                self.change_shaped(
                    &field.kind,
                    &path.child(PathStep::Field(segment.property)),
                    qualifier,
                    pos + consumed,
                    sub,
                )
            }

            FieldKind::Typed(variants) => {
                if at_end {
                    let (version, cell) = self.source.read_versioned_cell(StorageKind::TypeValue, kind)?;
                    return match cell {
                        Some(CellValue::Typed { variant, value }) => {
                            let definition = variants
                                .iter()
                                .find(|v| v.index == variant)
                                .ok_or_else(|| {
                                    CodecError::missing_definition(
                                        ErrorOrigin::Changes,
                                        format!("typed cell names unknown variant {variant}"),
                                    )
                                })?;

                            match value {
                                Some(inline) => self.log.push(
                                    version,
                                    RecordChange::ValueSet {
                                        path: path.clone(),
                                        value: Value::Typed {
                                            variant,
                                            value: Box::new(inline),
                                        },
                                    },
                                ),
                                None => {
                                    self.log.push(
                                        version,
                                        RecordChange::TypeSwitched {
                                            path: path.clone(),
                                            variant,
                                        },
                                    );
                                    if definition.payload.is_some() {
                                        self.cache.install_route(
                                            qualifier.len(),
                                            path.clone(),
                                            kind.clone(),
                                            selection.clone(),
                                        );
                                    }
                                }
                            }
                            Ok(())
                        }
                        Some(other) => Err(cell_mismatch("typed discriminator", &other)),
                        None => {
                            self.log.push(
                                version,
                                RecordChange::ValueDeleted { path: path.clone() },
                            );
                            self.cache.install_discard(qualifier.len());
                            Ok(())
                        }
                    };
                }

                let (segment, consumed) = read_segment(&qualifier[pos..], ErrorOrigin::Changes)?;
                if segment.tag != RefTag::Type {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        format!(
                            "typed payload expects a type segment, found {}",
                            segment.tag
                        ),
                    ));
                }

                let definition = variants
                    .iter()
                    .find(|v| v.index == segment.property)
                    .ok_or_else(|| {
                        CodecError::missing_definition(
                            ErrorOrigin::Changes,
                            format!("typed segment names unknown variant {}", segment.property),
                        )
                    })?;
                let payload_kind = definition.payload.as_ref().ok_or_else(|| {
                    CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        format!(
                            "variant {} has no payload but the qualifier continues",
                            definition.name
                        ),
                    )
                })?;

                self.change_shaped(
                    payload_kind,
                    &path.child(PathStep::Variant(segment.property)),
                    qualifier,
                    pos + consumed,
                    selection,
                )
            }

            _ => {
                if !at_end {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "qualifier continues past a scalar leaf",
                    ));
                }

                self.scalar_leaf(kind, path)
            }
        }
    }

    // Scalar cell event: non-null sets, null deletes.
    fn scalar_leaf(&mut self, kind: &FieldKind, path: &PropertyPath) -> Result<(), CodecError> {
        let (version, cell) = self.source.read_versioned_cell(StorageKind::Value, kind)?;

        match cell {
            Some(CellValue::Scalar(value)) => {
                self.log.push(
                    version,
                    RecordChange::ValueSet {
                        path: path.clone(),
                        value,
                    },
                );
                Ok(())
            }
            Some(other) => Err(cell_mismatch("scalar leaf", &other)),
            None => {
                self.log
                    .push(version, RecordChange::ValueDeleted { path: path.clone() });
                Ok(())
            }
        }
    }

    // Container size cell: present routes into items, a versioned null is
    // the container's own deletion and shadows whatever trails it.
    fn open_container(
        &mut self,
        size_kind: StorageKind,
        kind: &FieldKind,
        path: &PropertyPath,
        qualifier: &[u8],
        selection: &Selection,
    ) -> Result<(), CodecError> {
        let (version, cell) = self.source.read_versioned_cell(size_kind, kind)?;

        match cell {
            Some(CellValue::Count(_)) => {
                self.cache.install_route(
                    qualifier.len(),
                    path.clone(),
                    kind.clone(),
                    selection.clone(),
                );
                Ok(())
            }
            Some(other) => Err(cell_mismatch("container size", &other)),
            None => {
                self.log
                    .push(version, RecordChange::ValueDeleted { path: path.clone() });
                self.cache.install_discard(qualifier.len());
                Ok(())
            }
        }
    }

    fn apply_special(
        &mut self,
        qualifier: &[u8],
        marker_pos: usize,
        at_root: bool,
    ) -> Result<(), CodecError> {
        let marker = *qualifier.get(marker_pos).ok_or_else(|| {
            CodecError::malformed_qualifier(
                ErrorOrigin::Changes,
                "special segment is missing its marker byte",
            )
        })?;

        match marker {
            DELETE_MARKER => {
                if !at_root {
                    return Err(CodecError::unimplemented(
                        ErrorOrigin::Changes,
                        "delete markers under embedded records in change streams",
                    ));
                }
                if marker_pos + 1 != qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Changes,
                        "qualifier continues past a delete marker",
                    ));
                }

                let (version, cell) = self
                    .source
                    .read_versioned_cell(StorageKind::ObjectDelete, &FieldKind::Bool)?;
                match cell {
                    Some(CellValue::Scalar(Value::Bool(deleted))) => {
                        self.log
                            .push(version, RecordChange::SoftDeleted { deleted });
                        Ok(())
                    }
                    Some(other) => Err(cell_mismatch("delete marker", &other)),
                    None => {
                        // the marker cell was cleared, the record is live again
                        self.log
                            .push(version, RecordChange::SoftDeleted { deleted: false });
                        Ok(())
                    }
                }
            }
            MAP_KEY_MARKER => Err(CodecError::unsupported_shape(
                ErrorOrigin::Changes,
                "map-key marker is not a stored cell position",
            )),
            other => Err(CodecError::malformed_qualifier(
                ErrorOrigin::Changes,
                format!("unknown special marker byte {other}"),
            )),
        }
    }
}

fn cell_mismatch(position: &str, cell: &CellValue) -> CodecError {
    CodecError::storage(
        ErrorOrigin::Changes,
        format!("{position} cell holds a {} payload", cell.label()),
    )
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_log_keeps_groups_sorted_by_version() {
        let mut log = ChangeLog::default();
        log.push(7, RecordChange::SoftDeleted { deleted: true });
        log.push(2, RecordChange::ValueDeleted {
            path: PropertyPath::root(0),
        });
        log.push(7, RecordChange::ValueDeleted {
            path: PropertyPath::root(1),
        });
        log.push(5, RecordChange::SoftDeleted { deleted: false });

        let versions: Vec<u64> = log.groups.iter().map(|g| g.version).collect();
        assert_eq!(versions, [2, 5, 7]);
        assert_eq!(log.groups[2].changes.len(), 2);
    }

    #[test]
    fn set_additions_coalesce_per_path_within_a_version() {
        let mut log = ChangeLog::default();
        let tags = PropertyPath::root(3);
        let other = PropertyPath::root(4);

        log.push_set_item(1, &tags, Value::Uint(10));
        log.push_set_item(1, &tags, Value::Uint(11));
        log.push_set_item(1, &other, Value::Uint(12));
        log.push_set_item(2, &tags, Value::Uint(13));

        assert_eq!(log.groups.len(), 2);
        assert_eq!(
            log.groups[0].changes,
            vec![
                RecordChange::SetItemsAdded {
                    path: tags.clone(),
                    items: vec![Value::Uint(10), Value::Uint(11)],
                },
                RecordChange::SetItemsAdded {
                    path: other,
                    items: vec![Value::Uint(12)],
                },
            ]
        );
        assert_eq!(
            log.groups[1].changes,
            vec![RecordChange::SetItemsAdded {
                path: tags,
                items: vec![Value::Uint(13)],
            }]
        );
    }
}
