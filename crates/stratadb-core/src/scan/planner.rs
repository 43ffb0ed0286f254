//! Module: scan::planner
//! Responsibility: lower filter trees onto key and index layouts, fold
//! foldable clauses into contiguous byte bounds, and keep the rest as
//! residual matchers.
//! Does not own: envelope evaluation (scan::range) or component comparison
//! (scan::matcher).
//! Boundary: planning never fails; a clause that cannot narrow the range
//! falls through to the caller's full predicate.

use crate::{
    filter::{FilterClause, FilterCmp, FilterExpr},
    model::{
        ComponentWidth, FieldKind, FieldModel, IndexLayout, KEY_PART_SEPARATOR, KeyLayout,
        RecordSchema,
    },
    obs::{self, CodecEvent, PlanKind},
    scan::{
        matcher::{MatchOffset, PartialMatcher},
        range::{FieldValuePair, IndexScanRange, KeyScanRange, ScanRange},
    },
    value::{Value, push_length_prefix},
};
use std::ops::Bound;

/// Separator written after a folded exclusive lower bound; sorts after the
/// key-part separator, so prefix-equal keys fall before the start.
const SEPARATOR_EXCLUSIVE_START: u8 = KEY_PART_SEPARATOR + 1;

/// Separator written after a folded exclusive upper bound; sorts before the
/// key-part separator, so prefix-equal keys fall past the end.
const SEPARATOR_EXCLUSIVE_END: u8 = KEY_PART_SEPARATOR - 1;

/// Plan a scan over the primary key space.
///
/// `start_key` resumes a paused scan: it replaces the computed start when it
/// is strictly greater, or when equal and `include_start` tightens an
/// inclusive bound to exclusive. A caller key can never loosen the bounds
/// the filter produced.
#[must_use]
pub fn plan_key_scan(
    schema: &RecordSchema,
    filter: &FilterExpr,
    start_key: Option<&[u8]>,
    include_start: bool,
) -> KeyScanRange {
    let anchor = Anchor::Key(schema.key());

    let mut collector = PartialCollector::new(schema, anchor);
    collector.collect(filter);
    let PartialCollector {
        partials,
        unique_candidates,
        ..
    } = collector;

    let FoldOutcome {
        mut range,
        equal_pairs,
    } = fold_partials(anchor, partials);

    if let Some(caller) = start_key
        && (caller > range.start.as_slice()
            || (caller == range.start.as_slice() && !include_start))
    {
        range.start = caller.to_vec();
        range.start_inclusive = include_start;
    }

    obs::record(CodecEvent::PlanBuilt {
        kind: PlanKind::Key,
    });

    KeyScanRange::new(range, equal_pairs, unique_candidates)
}

/// Plan a scan over one secondary index's entry space.
#[must_use]
pub fn plan_index_scan(
    schema: &RecordSchema,
    index: &IndexLayout,
    filter: &FilterExpr,
) -> IndexScanRange {
    let anchor = Anchor::Index(index);

    let mut collector = PartialCollector::new(schema, anchor);
    collector.collect(filter);
    let PartialCollector { partials, .. } = collector;

    let FoldOutcome { range, .. } = fold_partials(anchor, partials);

    obs::record(CodecEvent::PlanBuilt {
        kind: PlanKind::Index,
    });

    IndexScanRange::new(range, index.clone())
}

///
/// Anchor
/// the layout a plan is built against, with its slot addressing rules
///

#[derive(Clone, Copy)]
enum Anchor<'a> {
    Key(&'a KeyLayout),
    Index(&'a IndexLayout),
}

impl<'a> Anchor<'a> {
    fn slot_count(self) -> usize {
        match self {
            Self::Key(layout) => layout.len(),
            Self::Index(layout) => layout.len(),
        }
    }

    /// Slot position, field kind, and matcher offset for a property index,
    /// when the field participates in this layout.
    fn resolve(self, field: u32) -> Option<(usize, &'a FieldKind, MatchOffset)> {
        match self {
            Self::Key(layout) => layout
                .part_for_field(field)
                .map(|(slot, part)| (slot, &part.kind, MatchOffset::Fixed(part.offset))),
            Self::Index(layout) => layout
                .component_for_field(field)
                .map(|(slot, component)| (slot, &component.kind, MatchOffset::Slot(slot))),
        }
    }

    /// Bound bytes for one slot's value, as stored: key parts hold raw
    /// storage bytes, index components carry their length prefix.
    fn fold_bytes(self, value_bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Key(_) => value_bytes.to_vec(),
            Self::Index(_) => {
                let mut out = Vec::with_capacity(value_bytes.len() + 2);
                push_length_prefix(&mut out, value_bytes.len());
                out.extend_from_slice(value_bytes);
                out
            }
        }
    }

    /// Whether a fold at `slot` must append a separator byte. Index entries
    /// never separate: their length prefixes already frame every component,
    /// and the final key part expresses inclusivity through the range flags.
    fn separates(self, slot: usize) -> bool {
        matches!(self, Self::Key(layout) if slot + 1 < layout.len())
    }

    /// Whether inequality and membership folds are sound at `slot`.
    ///
    /// Index components of variable width order by their length prefix
    /// first, so only exact matches fold there; the clause stays residual.
    fn can_fold_bounds(self, slot: usize) -> bool {
        match self {
            Self::Key(_) => true,
            Self::Index(layout) => layout
                .components()
                .get(slot)
                .is_some_and(|component| matches!(component.width, ComponentWidth::Fixed(_))),
        }
    }
}

///
/// SlotPartial
/// one collected matcher, pinned to its layout slot
///

struct SlotPartial {
    slot: usize,
    field: u32,

    /// semantic value behind an exact matcher, recorded as an equality pair
    /// if the matcher folds
    value: Option<Value>,

    matcher: PartialMatcher,
}

///
/// PartialCollector
/// filter-tree walk that turns narrowing clauses into slot partials
///

struct PartialCollector<'a> {
    schema: &'a RecordSchema,
    anchor: Anchor<'a>,
    partials: Vec<SlotPartial>,
    unique_candidates: Vec<FieldValuePair>,
}

impl<'a> PartialCollector<'a> {
    const fn new(schema: &'a RecordSchema, anchor: Anchor<'a>) -> Self {
        Self {
            schema,
            anchor,
            partials: Vec::new(),
            unique_candidates: Vec::new(),
        }
    }

    fn collect(&mut self, filter: &FilterExpr) {
        match filter {
            FilterExpr::And(children) => {
                for child in children {
                    self.collect(child);
                }
            }
            FilterExpr::Clause(clause) => self.collect_clause(clause),
            FilterExpr::Range {
                field,
                lower,
                upper,
            } => self.collect_range(field, lower, upper),

            // nothing contiguous to extract; the caller's full predicate
            // still applies these
            FilterExpr::True | FilterExpr::False | FilterExpr::Or(_) | FilterExpr::Not(_) => {}
        }
    }

    fn collect_clause(&mut self, clause: &FilterClause) {
        let Some(field) = self.schema.field_named(&clause.field) else {
            return;
        };
        let Some((slot, kind, offset)) = self.anchor.resolve(field.index) else {
            return;
        };

        match clause.cmp {
            FilterCmp::Eq => {
                let Some(bytes) = encode_probe(kind, &clause.value) else {
                    return;
                };
                self.partials.push(SlotPartial {
                    slot,
                    field: field.index,
                    value: Some(clause.value.clone()),
                    matcher: PartialMatcher::exact(offset, bytes),
                });
            }

            FilterCmp::Gt | FilterCmp::Gte => {
                let Some(bytes) = encode_probe(kind, &clause.value) else {
                    return;
                };
                self.partials.push(SlotPartial {
                    slot,
                    field: field.index,
                    value: None,
                    matcher: PartialMatcher::lower_bound(offset, bytes, clause.cmp == FilterCmp::Gte),
                });
            }

            FilterCmp::Lt | FilterCmp::Lte => {
                let Some(bytes) = encode_probe(kind, &clause.value) else {
                    return;
                };
                self.partials.push(SlotPartial {
                    slot,
                    field: field.index,
                    value: None,
                    matcher: PartialMatcher::upper_bound(offset, bytes, clause.cmp == FilterCmp::Lte),
                });
            }

            FilterCmp::In => self.collect_membership(clause, slot, field, kind, offset),

            // no contiguous byte interval exists for a disequality
            FilterCmp::Ne => {}
        }
    }

    fn collect_membership(
        &mut self,
        clause: &FilterClause,
        slot: usize,
        field: &FieldModel,
        kind: &FieldKind,
        offset: MatchOffset,
    ) {
        let Value::List(candidates) = &clause.value else {
            return;
        };
        if candidates.is_empty() {
            return;
        }

        let mut encoded: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // one unencodable candidate makes the whole membership
            // unfoldable; dropping just that candidate would be unsound
            let Some(bytes) = encode_probe(kind, candidate) else {
                return;
            };
            encoded.push((bytes, candidate));
        }

        encoded.sort_by(|a, b| a.0.cmp(&b.0));
        encoded.dedup_by(|a, b| a.0 == b.0);

        if field.unique && matches!(self.anchor, Anchor::Key(_)) {
            self.unique_candidates
                .extend(encoded.iter().map(|(_, value)| FieldValuePair {
                    field: field.index,
                    value: (*value).clone(),
                }));
        }

        let bytes = encoded.into_iter().map(|(bytes, _)| bytes).collect();
        self.partials.push(SlotPartial {
            slot,
            field: field.index,
            value: None,
            matcher: PartialMatcher::one_of(offset, bytes),
        });
    }

    fn collect_range(&mut self, field_name: &str, lower: &Bound<Value>, upper: &Bound<Value>) {
        let Some(field) = self.schema.field_named(field_name) else {
            return;
        };
        let Some((slot, kind, offset)) = self.anchor.resolve(field.index) else {
            return;
        };

        if let Bound::Included(value) | Bound::Excluded(value) = lower
            && let Some(bytes) = encode_probe(kind, value)
        {
            let inclusive = matches!(lower, Bound::Included(_));
            self.partials.push(SlotPartial {
                slot,
                field: field.index,
                value: None,
                matcher: PartialMatcher::lower_bound(offset, bytes, inclusive),
            });
        }

        if let Bound::Included(value) | Bound::Excluded(value) = upper
            && let Some(bytes) = encode_probe(kind, value)
        {
            let inclusive = matches!(upper, Bound::Included(_));
            self.partials.push(SlotPartial {
                slot,
                field: field.index,
                value: None,
                matcher: PartialMatcher::upper_bound(offset, bytes, inclusive),
            });
        }
    }
}

// storage bytes for a probe value, when the field kind accepts it
fn encode_probe(kind: &FieldKind, value: &Value) -> Option<Vec<u8>> {
    if !kind.accepts(value) {
        return None;
    }

    value.storage_bytes()
}

///
/// FoldOutcome
///

struct FoldOutcome {
    range: ScanRange,
    equal_pairs: Vec<FieldValuePair>,
}

/// Greedily fold slot partials into contiguous bounds.
///
/// Slots fold in layout order starting at slot zero. Per slot, the first
/// exact matcher folds and keeps the walk alive; otherwise the first lower
/// and upper bounds fold and end it; otherwise a membership hull folds (its
/// matcher stays residual) and ends it. The first slot with no partials is a
/// gap: nothing beyond it can extend a contiguous byte interval.
fn fold_partials(anchor: Anchor<'_>, mut partials: Vec<SlotPartial>) -> FoldOutcome {
    partials.sort_by_key(|partial| partial.slot);

    let mut by_slot: Vec<Vec<usize>> = vec![Vec::new(); anchor.slot_count()];
    for (position, partial) in partials.iter().enumerate() {
        if let Some(bucket) = by_slot.get_mut(partial.slot) {
            bucket.push(position);
        }
    }

    let mut range = ScanRange::default();
    let mut equal_pairs = Vec::new();
    let mut absorbed = vec![false; partials.len()];

    for (slot, group) in by_slot.iter().enumerate() {
        if group.is_empty() {
            break;
        }

        let exact = group.iter().find_map(|&position| {
            partials[position]
                .matcher
                .exact_bytes()
                .map(|bytes| (position, anchor.fold_bytes(bytes)))
        });
        if let Some((position, folded)) = exact {
            range.start.extend_from_slice(&folded);
            range.end.extend_from_slice(&folded);
            if anchor.separates(slot) {
                range.start.push(KEY_PART_SEPARATOR);
                range.end.push(KEY_PART_SEPARATOR);
            }

            absorbed[position] = true;
            if let Some(value) = partials[position].value.take() {
                equal_pairs.push(FieldValuePair {
                    field: partials[position].field,
                    value,
                });
            }

            continue;
        }

        if !anchor.can_fold_bounds(slot) {
            break;
        }

        let lower = group.iter().find_map(|&position| {
            partials[position]
                .matcher
                .lower_bound_parts()
                .map(|(bytes, inclusive)| (position, anchor.fold_bytes(bytes), inclusive))
        });
        let upper = group.iter().find_map(|&position| {
            partials[position]
                .matcher
                .upper_bound_parts()
                .map(|(bytes, inclusive)| (position, anchor.fold_bytes(bytes), inclusive))
        });

        if lower.is_some() || upper.is_some() {
            if let Some((position, folded, inclusive)) = lower {
                range.start.extend_from_slice(&folded);
                if anchor.separates(slot) {
                    range.start.push(if inclusive {
                        KEY_PART_SEPARATOR
                    } else {
                        SEPARATOR_EXCLUSIVE_START
                    });
                } else {
                    range.start_inclusive = inclusive;
                }
                absorbed[position] = true;
            }

            if let Some((position, folded, inclusive)) = upper {
                range.end.extend_from_slice(&folded);
                if anchor.separates(slot) {
                    range.end.push(if inclusive {
                        KEY_PART_SEPARATOR
                    } else {
                        SEPARATOR_EXCLUSIVE_END
                    });
                } else {
                    range.end_inclusive = inclusive;
                }
                absorbed[position] = true;
            }

            break;
        }

        let hull = group.iter().find_map(|&position| {
            let candidates = partials[position].matcher.one_of_candidates()?;
            Some((candidates.first()?.clone(), candidates.last()?.clone()))
        });
        if let Some((first, last)) = hull {
            range.start.extend_from_slice(&anchor.fold_bytes(&first));
            range.end.extend_from_slice(&anchor.fold_bytes(&last));
            if anchor.separates(slot) {
                range.start.push(KEY_PART_SEPARATOR);
                range.end.push(KEY_PART_SEPARATOR);
            }
            // the hull bounds the candidate set; membership itself stays
            // residual
        }

        break;
    }

    range.partials = partials
        .into_iter()
        .zip(absorbed)
        .filter_map(|(partial, taken)| (!taken).then_some(partial.matcher))
        .collect();

    FoldOutcome { range, equal_pairs }
}
