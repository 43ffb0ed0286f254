//! Module: qualifier::decode
//! Responsibility: rebuild a structured record from a strictly ascending
//! qualifier stream, routing shared prefixes through a depth-indexed cache
//! Does not own: cell storage (the `ValueSource`), version grouping
//! (qualifier::changes)
//! Boundary: every stored qualifier is read at most once; a cached route is
//! valid exactly while the stream stays inside the prefix it was installed at

use crate::{
    error::{CodecError, ErrorOrigin},
    model::{FieldKind, SchemaId, SchemaRegistry},
    obs::{self, CodecEvent},
    qualifier::{
        CellValue, PathStep, PropertyPath, Qualifier, Selection, StorageKind, ValueSource,
        encode::shape_tag,
        segment::{DELETE_MARKER, LIST_INDEX_SIZE, MAP_KEY_MARKER, RefTag, read_segment},
    },
    value::{Record, Value, read_ordered_varint},
};

/// Reconstruct one record from `source`.
///
/// Qualifiers must arrive in strictly ascending byte order. `selection`
/// prunes subtrees; unselected qualifiers are skipped without a cell read.
pub fn decode_record<S>(
    registry: &SchemaRegistry,
    schema: SchemaId,
    source: &mut S,
    selection: &Selection,
) -> Result<Record, CodecError>
where
    S: ValueSource,
{
    decode_record_cached(registry, schema, source, selection, true)
}

/// Decode with the prefix cache toggled.
///
/// Disabling re-walks every qualifier from the schema root. Output is
/// identical either way; discard entries for deleted subtrees are kept even
/// when disabled because they carry meaning, not speed.
pub(crate) fn decode_record_cached<S>(
    registry: &SchemaRegistry,
    schema: SchemaId,
    source: &mut S,
    selection: &Selection,
    cache_enabled: bool,
) -> Result<Record, CodecError>
where
    S: ValueSource,
{
    obs::record(CodecEvent::DecodePass);

    let mut pass = DecodePass {
        registry,
        schema,
        source,
        out: Record::new(),
        cache: DecodeCache::new(cache_enabled),
    };
    pass.run(selection)?;

    Ok(pass.out)
}

///
/// DecodeCache
///
/// Stack of routes installed while descending; entry depths strictly
/// increase, so divergence eviction is a pop loop.
///

pub(super) struct DecodeCache {
    entries: Vec<CacheEntry>,
    enabled: bool,
}

pub(super) struct CacheEntry {
    pub depth: usize,
    pub action: RouteAction,
}

pub(super) enum RouteAction {
    /// swallow every qualifier under the prefix
    Discard,

    /// decode the suffix as `kind` rooted at `path`
    Decode {
        path: PropertyPath,
        kind: FieldKind,
        selection: Selection,
    },
}

impl DecodeCache {
    pub(super) const fn new(enabled: bool) -> Self {
        Self {
            entries: Vec::new(),
            enabled,
        }
    }

    /// Drop entries installed deeper than the surviving shared prefix.
    pub(super) fn evict_diverged(&mut self, shared_prefix: usize) {
        let mut evicted = 0;
        while self.entries.last().is_some_and(|e| e.depth > shared_prefix) {
            self.entries.pop();
            evicted += 1;
        }

        if evicted > 0 {
            obs::record(CodecEvent::CacheEvicted { count: evicted });
        }
    }

    pub(super) fn top(&self) -> Option<&CacheEntry> {
        self.entries.last()
    }

    /// Install a decoding route; dropped silently when the cache is off.
    pub(super) fn install_route(
        &mut self,
        depth: usize,
        path: PropertyPath,
        kind: FieldKind,
        selection: Selection,
    ) {
        if self.enabled {
            self.entries.push(CacheEntry {
                depth,
                action: RouteAction::Decode {
                    path,
                    kind,
                    selection,
                },
            });
        }
    }

    /// Install a selection skip; dropped silently when the cache is off
    /// (an uncached walk re-skips from the root with the same outcome).
    pub(super) fn install_skip(&mut self, depth: usize) {
        if self.enabled {
            self.entries.push(CacheEntry {
                depth,
                action: RouteAction::Discard,
            });
        }
    }

    /// Install a deleted-subtree discard. Always installed: without it the
    /// items trailing a deleted container would be read as live data.
    pub(super) fn install_discard(&mut self, depth: usize) {
        self.entries.push(CacheEntry {
            depth,
            action: RouteAction::Discard,
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
/// DecodePass
/// scan-local state for one reconstruction
///

struct DecodePass<'a, S> {
    registry: &'a SchemaRegistry,
    schema: SchemaId,
    source: &'a mut S,
    out: Record,
    cache: DecodeCache,
}

impl<S> DecodePass<'_, S>
where
    S: ValueSource,
{
    fn run(&mut self, selection: &Selection) -> Result<(), CodecError> {
        let mut previous: Option<Qualifier> = None;

        while let Some(qualifier) = self.source.next_qualifier() {
            let shared = match &previous {
                Some(prev) => {
                    if qualifier.as_bytes() <= prev.as_bytes() {
                        return Err(CodecError::malformed_qualifier(
                            ErrorOrigin::Decode,
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
                    self.decode_shaped(&kind, &path, qualifier.as_bytes(), depth, &selection)?;
                }
                Dispatch::Cold => {
                    obs::record(CodecEvent::QualifierRouted { cache_hit: false });
                    self.decode_root(qualifier.as_bytes(), selection)?;
                }
            }

            previous = Some(qualifier);
        }

        Ok(())
    }

    // Cold entry: resolve the leading segment against the root schema.
    fn decode_root(&mut self, qualifier: &[u8], selection: &Selection) -> Result<(), CodecError> {
        let (segment, consumed) = read_segment(qualifier, ErrorOrigin::Decode)?;

        if segment.tag == RefTag::Special {
            return self.apply_special(qualifier, consumed, &PropertyPath::default());
        }

        let schema = self.registry.schema(self.schema)?;
        let field = schema.expect_field(segment.property, ErrorOrigin::Decode)?;

        let Some(sub) = selection.narrow(segment.property) else {
            self.cache.install_skip(consumed);
            return Ok(());
        };

        if shape_tag(&field.kind) != segment.tag {
            return Err(tag_mismatch(&field.kind, segment.tag));
        }

        self.decode_shaped(
            &field.kind,
            &PropertyPath::root(segment.property),
            qualifier,
            consumed,
            sub,
        )
    }

    // One value position. `pos` is where this shape's suffix begins; the
    // qualifier ends here exactly when the cell belongs to the shape itself.
    #[expect(clippy::too_many_lines)]
    fn decode_shaped(
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

                let end = pos + LIST_INDEX_SIZE;
                if end != qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
                        "list item suffix must be exactly four index bytes",
                    ));
                }
                let raw: [u8; LIST_INDEX_SIZE] = qualifier[pos..end]
                    .try_into()
                    .map_err(|_| {
                        CodecError::malformed_qualifier(
                            ErrorOrigin::Decode,
                            "list item index is truncated",
                        )
                    })?;
                let index = u32::from_be_bytes(raw);

                match self.source.read_cell(StorageKind::Value, item)? {
                    Some(CellValue::Scalar(value)) => {
                        self.place(&path.child(PathStep::ListItem(index)), value)
                    }
                    Some(other) => Err(cell_mismatch("list item", &other)),
                    None => Ok(()),
                }
            }

            FieldKind::Set(item) => {
                if at_end {
                    return self.open_container(StorageKind::SetSize, kind, path, qualifier, selection);
                }

                let item_value = item.read_storage_bytes(&qualifier[pos..], ErrorOrigin::Decode)?;

                // the cell only marks the item live; its value is the suffix
                match self.source.read_cell(StorageKind::Value, item)? {
                    Some(_) => self.place(&path.child(PathStep::SetItem(item_value.clone())), item_value),
                    None => Ok(()),
                }
            }

            FieldKind::Map { key, value } => {
                if at_end {
                    return self.open_container(StorageKind::MapSize, kind, path, qualifier, selection);
                }

                let (len, consumed) = read_ordered_varint(&qualifier[pos..]).ok_or_else(|| {
                    CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
                        "map key length prefix is unreadable",
                    )
                })?;
                let len = usize::try_from(len).map_err(|_| {
                    CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
                        "map key length exceeds the address space",
                    )
                })?;

                let start = pos + consumed;
                let end = start + len;
                if end > qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
                        "map key bytes are truncated",
                    ));
                }

                let key_value = key.read_storage_bytes(&qualifier[start..end], ErrorOrigin::Decode)?;

                self.decode_shaped(
                    value,
                    &path.child(PathStep::MapKey(key_value)),
                    qualifier,
                    end,
                    selection,
                )
            }

            FieldKind::Embed(id) => {
                if at_end {
                    return match self.source.read_cell(StorageKind::Embed, kind)? {
                        Some(_) => {
                            self.place(path, Value::Embed(Record::new()))?;
                            self.cache.install_route(
                                qualifier.len(),
                                path.clone(),
                                kind.clone(),
                                selection.clone(),
                            );
                            Ok(())
                        }
                        None => {
                            self.cache.install_discard(qualifier.len());
                            Ok(())
                        }
                    };
                }

                let (segment, consumed) = read_segment(&qualifier[pos..], ErrorOrigin::Decode)?;
                if segment.tag == RefTag::Special {
                    return self.apply_special(qualifier, pos + consumed, path);
                }

                let schema = self.registry.schema(*id)?;
                let field = schema.expect_field(segment.property, ErrorOrigin::Decode)?;

                let Some(sub) = selection.narrow(segment.property) else {
                    self.cache.install_skip(pos + consumed);
                    return Ok(());
                };

                if shape_tag(&field.kind) != segment.tag {
                    return Err(tag_mismatch(&field.kind, segment.tag));
                }

                self.decode_shaped(
                    &field.kind,
                    &path.child(PathStep::Field(segment.property)),
                    qualifier,
                    pos + consumed,
                    sub,
                )
            }

            FieldKind::Typed(variants) => {
                if at_end {
                    return match self.source.read_cell(StorageKind::TypeValue, kind)? {
                        Some(CellValue::Typed { variant, value }) => {
                            let definition = variants
                                .iter()
                                .find(|v| v.index == variant)
                                .ok_or_else(|| {
                                    CodecError::missing_definition(
                                        ErrorOrigin::Decode,
                                        format!("typed cell names unknown variant {variant}"),
                                    )
                                })?;

                            let payload = match (value, &definition.payload) {
                                // inline scalar payload, the cell is complete
                                (Some(inline), _) => inline,
                                (None, None) => Value::Unit,
                                (None, Some(payload_kind)) => {
                                    // payload arrives through child qualifiers
                                    self.cache.install_route(
                                        qualifier.len(),
                                        path.clone(),
                                        kind.clone(),
                                        selection.clone(),
                                    );
                                    empty_payload(payload_kind)
                                }
                            };

                            self.place(
                                path,
                                Value::Typed {
                                    variant,
                                    value: Box::new(payload),
                                },
                            )
                        }
                        Some(other) => Err(cell_mismatch("typed discriminator", &other)),
                        None => {
                            self.cache.install_discard(qualifier.len());
                            Ok(())
                        }
                    };
                }

                let (segment, consumed) = read_segment(&qualifier[pos..], ErrorOrigin::Decode)?;
                if segment.tag != RefTag::Type {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
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
                            ErrorOrigin::Decode,
                            format!("typed segment names unknown variant {}", segment.property),
                        )
                    })?;
                let payload_kind = definition.payload.as_ref().ok_or_else(|| {
                    CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
                        format!(
                            "variant {} has no payload but the qualifier continues",
                            definition.name
                        ),
                    )
                })?;

                self.decode_shaped(
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
                        ErrorOrigin::Decode,
                        "qualifier continues past a scalar leaf",
                    ));
                }

                match self.source.read_cell(StorageKind::Value, kind)? {
                    Some(CellValue::Scalar(value)) => self.place(path, value),
                    Some(other) => Err(cell_mismatch("scalar leaf", &other)),
                    None => Ok(()),
                }
            }
        }
    }

    // Container cell at its own qualifier: allocate and route, or discard.
    fn open_container(
        &mut self,
        size_kind: StorageKind,
        kind: &FieldKind,
        path: &PropertyPath,
        qualifier: &[u8],
        selection: &Selection,
    ) -> Result<(), CodecError> {
        match self.source.read_cell(size_kind, kind)? {
            Some(CellValue::Count(count)) => {
                self.place(path, empty_container(kind, count as usize))?;
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
                self.cache.install_discard(qualifier.len());
                Ok(())
            }
        }
    }

    // Special marker: delete markers flip the soft-delete flag of the record
    // at `path` (the root when empty); map-key markers never occupy a stored
    // cell position.
    fn apply_special(
        &mut self,
        qualifier: &[u8],
        marker_pos: usize,
        path: &PropertyPath,
    ) -> Result<(), CodecError> {
        let marker = *qualifier.get(marker_pos).ok_or_else(|| {
            CodecError::malformed_qualifier(
                ErrorOrigin::Decode,
                "special segment is missing its marker byte",
            )
        })?;

        match marker {
            DELETE_MARKER => {
                if marker_pos + 1 != qualifier.len() {
                    return Err(CodecError::malformed_qualifier(
                        ErrorOrigin::Decode,
                        "qualifier continues past a delete marker",
                    ));
                }

                match self.source.read_cell(StorageKind::ObjectDelete, &FieldKind::Bool)? {
                    Some(CellValue::Scalar(Value::Bool(deleted))) => {
                        self.set_soft_deleted(path, deleted)
                    }
                    Some(other) => Err(cell_mismatch("delete marker", &other)),
                    None => Ok(()),
                }
            }
            MAP_KEY_MARKER => Err(CodecError::unsupported_shape(
                ErrorOrigin::Decode,
                "map-key marker is not a stored cell position",
            )),
            other => Err(CodecError::malformed_qualifier(
                ErrorOrigin::Decode,
                format!("unknown special marker byte {other}"),
            )),
        }
    }

    fn set_soft_deleted(&mut self, path: &PropertyPath, deleted: bool) -> Result<(), CodecError> {
        if path.is_empty() {
            self.out.set_soft_deleted(deleted);
            return Ok(());
        }

        match resolve_value_mut(&mut self.out, path.steps()) {
            Some(Value::Embed(record)) => {
                record.set_soft_deleted(deleted);
                Ok(())
            }
            _ => Err(CodecError::malformed_qualifier(
                ErrorOrigin::Decode,
                "delete marker targets no embedded record",
            )),
        }
    }

    fn place(&mut self, path: &PropertyPath, value: Value) -> Result<(), CodecError> {
        place_value(&mut self.out, path.steps(), value)
    }
}

fn tag_mismatch(kind: &FieldKind, tag: RefTag) -> CodecError {
    CodecError::malformed_qualifier(
        ErrorOrigin::Decode,
        format!(
            "segment tag {tag} does not match the {} field shape",
            kind.label()
        ),
    )
}

// Fresh container for a size cell; counts are capacity hints only.
fn empty_container(kind: &FieldKind, count: usize) -> Value {
    match kind {
        FieldKind::List(_) => Value::List(Vec::with_capacity(count)),
        FieldKind::Set(_) => Value::Set(Vec::with_capacity(count)),
        FieldKind::Map { .. } => Value::Map(Vec::with_capacity(count)),
        _ => Value::Unit,
    }
}

// Placeholder for a typed payload announced by its discriminator cell but
// delivered through later qualifiers.
fn empty_payload(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::List(_) => Value::List(Vec::new()),
        FieldKind::Set(_) => Value::Set(Vec::new()),
        FieldKind::Map { .. } => Value::Map(Vec::new()),
        FieldKind::Embed(_) => Value::Embed(Record::new()),
        _ => Value::Unit,
    }
}

fn cell_mismatch(position: &str, cell: &CellValue) -> CodecError {
    CodecError::storage(
        ErrorOrigin::Decode,
        format!("{position} cell holds a {} payload", cell.label()),
    )
}

/// Walk `path` through the live output tree.
pub(super) fn resolve_value_mut<'a>(
    out: &'a mut Record,
    path: &[PathStep],
) -> Option<&'a mut Value> {
    let (first, rest) = path.split_first()?;
    let PathStep::Field(index) = first else {
        return None;
    };

    let mut current = out.get_mut(*index)?;
    for step in rest {
        current = step_into(current, step)?;
    }

    Some(current)
}

fn step_into<'a>(current: &'a mut Value, step: &PathStep) -> Option<&'a mut Value> {
    match (current, step) {
        (Value::Embed(record), PathStep::Field(index)) => record.get_mut(*index),
        (Value::List(items), PathStep::ListItem(index)) => items.get_mut(*index as usize),
        (Value::Map(entries), PathStep::MapKey(key)) => entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v),
        (Value::Typed { variant, value }, PathStep::Variant(wanted)) => {
            (*variant == *wanted).then(|| value.as_mut())
        }
        _ => None,
    }
}

/// Insert `value` at `path`, which must address into live structure.
pub(super) fn place_value(
    out: &mut Record,
    path: &[PathStep],
    value: Value,
) -> Result<(), CodecError> {
    let unplaceable = || {
        CodecError::malformed_qualifier(
            ErrorOrigin::Decode,
            "qualifier addresses into structure the stream never allocated",
        )
    };

    match path {
        [] => Err(unplaceable()),
        [PathStep::Field(index)] => {
            out.insert(*index, value);
            Ok(())
        }
        [parent @ .., last] => {
            let target = resolve_value_mut(out, parent).ok_or_else(unplaceable)?;
            insert_step(target, last, value).then_some(()).ok_or_else(unplaceable)
        }
    }
}

// Final hop of a placement; false when the live structure disagrees.
fn insert_step(target: &mut Value, step: &PathStep, value: Value) -> bool {
    match step {
        PathStep::Field(index) => match target {
            Value::Embed(record) => {
                record.insert(*index, value);
                true
            }
            _ => false,
        },
        PathStep::ListItem(index) => target.push_list_item(*index, value),
        PathStep::SetItem(_) => target.insert_set_item(value),
        PathStep::MapKey(key) => target.insert_map_entry(key.clone(), value),
        PathStep::Variant(wanted) => match target {
            Value::Typed { variant, value: slot } if variant == wanted => {
                *slot = Box::new(value);
                true
            }
            _ => false,
        },
    }
}
