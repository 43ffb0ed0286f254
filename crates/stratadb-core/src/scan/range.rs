//! Module: scan::range
//! Responsibility: scan envelope types and their evaluation against candidate
//! keys (before-start, out-of-range, residual matching, emptiness).
//! Does not own: bound construction (scan::planner) or component comparison
//! rules (scan::matcher).
//! Boundary: bounds may be shorter than stored keys; every comparison
//! truncates the candidate to the bound's length first.

use crate::{
    model::IndexLayout,
    scan::matcher::{MatchOffset, PartialMatcher},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, ops::Deref};

///
/// ScanRange
///
/// One contiguous byte interval over an ordered keyspace plus the residual
/// matchers the interval could not absorb. An empty `start` bounds nothing
/// from below; an empty `end` leaves the scan unbounded above.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScanRange {
    #[serde(with = "serde_bytes")]
    pub start: Vec<u8>,
    pub start_inclusive: bool,

    #[serde(with = "serde_bytes")]
    pub end: Vec<u8>,
    pub end_inclusive: bool,

    pub partials: Vec<PartialMatcher>,
}

impl Default for ScanRange {
    fn default() -> Self {
        Self {
            start: Vec::new(),
            start_inclusive: true,
            end: Vec::new(),
            end_inclusive: true,
            partials: Vec::new(),
        }
    }
}

impl ScanRange {
    /// Whether `key` sorts before the first admissible key.
    #[must_use]
    pub fn key_before_start(&self, key: &[u8]) -> bool {
        if self.start.is_empty() {
            return false;
        }

        match prefix_cmp(key, &self.start) {
            Ordering::Less => true,
            Ordering::Equal => !self.start_inclusive,
            Ordering::Greater => false,
        }
    }

    /// Whether `key` sorts past the last admissible key.
    #[must_use]
    pub fn key_out_of_range(&self, key: &[u8]) -> bool {
        if self.end.is_empty() {
            return false;
        }

        match prefix_cmp(key, &self.end) {
            Ordering::Greater => true,
            Ordering::Equal => !self.end_inclusive,
            Ordering::Less => false,
        }
    }

    /// Whether the envelope admits no key at all.
    ///
    /// A longer bound inside the other bound's prefix narrows rather than
    /// empties the range, so equal prefixes defer to the shorter side's
    /// inclusivity.
    #[must_use]
    pub fn is_empty_envelope(&self) -> bool {
        if self.start.is_empty() || self.end.is_empty() {
            return false;
        }

        let shared = self.start.len().min(self.end.len());
        match self.start[..shared].cmp(&self.end[..shared]) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => {
                if self.start.len() > self.end.len() {
                    !self.end_inclusive
                } else if self.end.len() > self.start.len() {
                    !self.start_inclusive
                } else {
                    !(self.start_inclusive && self.end_inclusive)
                }
            }
        }
    }

    /// Evaluate every residual matcher against one candidate key.
    ///
    /// Slot-addressed matchers need the index layout that framed the entry;
    /// without it they fail closed.
    #[must_use]
    pub fn matches_partials(&self, key: &[u8], layout: Option<&IndexLayout>) -> bool {
        self.partials.iter().all(|matcher| {
            component_bytes(key, matcher, layout)
                .is_some_and(|component| matcher.matches_component(component))
        })
    }
}

// compare the candidate's leading bytes against a (possibly shorter) bound
fn prefix_cmp(key: &[u8], bound: &[u8]) -> Ordering {
    let shared = key.len().min(bound.len());
    match key[..shared].cmp(&bound[..shared]) {
        Ordering::Equal if key.len() < bound.len() => Ordering::Less,
        ordering => ordering,
    }
}

// slice the component a matcher probes out of one candidate key
fn component_bytes<'k>(
    key: &'k [u8],
    matcher: &PartialMatcher,
    layout: Option<&IndexLayout>,
) -> Option<&'k [u8]> {
    match matcher.offset() {
        MatchOffset::Fixed(at) => {
            let len = matcher.probe_len()?;
            key.get(at..at + len)
        }
        MatchOffset::Slot(slot) => {
            let range = layout?.locate_slot(key, slot)?;
            key.get(range)
        }
    }
}

///
/// FieldValuePair
/// one field's semantic value, recorded alongside a folded or fast-path bound
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldValuePair {
    pub field: u32,
    pub value: Value,
}

///
/// KeyScanRange
///
/// Scan envelope anchored to a primary key layout. Carries the equality
/// pairs absorbed into the bounds and any unique-field candidates eligible
/// for point lookups instead of a scan.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyScanRange {
    range: ScanRange,
    equal_pairs: Vec<FieldValuePair>,
    unique_candidates: Vec<FieldValuePair>,
}

impl KeyScanRange {
    pub(super) const fn new(
        range: ScanRange,
        equal_pairs: Vec<FieldValuePair>,
        unique_candidates: Vec<FieldValuePair>,
    ) -> Self {
        Self {
            range,
            equal_pairs,
            unique_candidates,
        }
    }

    #[must_use]
    pub fn equal_pairs(&self) -> &[FieldValuePair] {
        &self.equal_pairs
    }

    #[must_use]
    pub fn unique_candidates(&self) -> &[FieldValuePair] {
        &self.unique_candidates
    }

    /// Evaluate the residual matchers; key plans only carry fixed offsets.
    #[must_use]
    pub fn matches_partials(&self, key: &[u8]) -> bool {
        self.range.matches_partials(key, None)
    }
}

impl Deref for KeyScanRange {
    type Target = ScanRange;

    fn deref(&self) -> &Self::Target {
        &self.range
    }
}

///
/// IndexScanRange
///
/// Scan envelope anchored to a secondary index. Owns the entry layout so
/// slot-addressed matchers can locate their component bytes per entry.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexScanRange {
    range: ScanRange,
    layout: IndexLayout,
}

impl IndexScanRange {
    pub(super) const fn new(range: ScanRange, layout: IndexLayout) -> Self {
        Self { range, layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    /// Evaluate the residual matchers against one stored index entry.
    #[must_use]
    pub fn matches_partials(&self, entry: &[u8]) -> bool {
        self.range.matches_partials(entry, Some(&self.layout))
    }
}

impl Deref for IndexScanRange {
    type Target = ScanRange;

    fn deref(&self) -> &Self::Target {
        &self.range
    }
}

///
/// TESTS
///
