//! Module: scan::matcher
//! Responsibility: residual byte predicates applied to candidate keys after
//! range bounding.
//! Does not own: bound folding (scan::planner) or slot location inside
//! self-describing entries (model::index).
//! Boundary: matchers compare raw component bytes; callers slice the
//! component out of the candidate first.

use serde::{Deserialize, Serialize};

///
/// MatchOffset
///
/// Where a matcher's component lives inside a candidate key.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MatchOffset {
    /// absolute byte position within a fixed-layout primary key
    Fixed(usize),

    /// component slot within a length-prefixed index entry, resolved per
    /// entry because preceding components may vary in width
    Slot(usize),
}

///
/// PartialMatcher
///
/// One predicate over a single key component that the contiguous scan range
/// could not absorb. Evaluated as a post-filter on every candidate the range
/// scan returns.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PartialMatcher {
    Exact {
        offset: MatchOffset,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    LowerBound {
        offset: MatchOffset,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        inclusive: bool,
    },
    UpperBound {
        offset: MatchOffset,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        inclusive: bool,
    },
    OneOf {
        offset: MatchOffset,
        /// sorted, deduplicated candidate encodings
        candidates: Vec<Vec<u8>>,
    },
}

impl PartialMatcher {
    #[must_use]
    pub(super) const fn exact(offset: MatchOffset, bytes: Vec<u8>) -> Self {
        Self::Exact { offset, bytes }
    }

    #[must_use]
    pub(super) const fn lower_bound(offset: MatchOffset, bytes: Vec<u8>, inclusive: bool) -> Self {
        Self::LowerBound {
            offset,
            bytes,
            inclusive,
        }
    }

    #[must_use]
    pub(super) const fn upper_bound(offset: MatchOffset, bytes: Vec<u8>, inclusive: bool) -> Self {
        Self::UpperBound {
            offset,
            bytes,
            inclusive,
        }
    }

    /// Build a membership matcher; candidates are sorted and deduplicated so
    /// the hull fold and the binary-searched evaluation agree.
    #[must_use]
    pub(super) fn one_of(offset: MatchOffset, mut candidates: Vec<Vec<u8>>) -> Self {
        candidates.sort();
        candidates.dedup();

        Self::OneOf { offset, candidates }
    }

    #[must_use]
    pub const fn offset(&self) -> MatchOffset {
        match self {
            Self::Exact { offset, .. }
            | Self::LowerBound { offset, .. }
            | Self::UpperBound { offset, .. }
            | Self::OneOf { offset, .. } => *offset,
        }
    }

    /// Component width this matcher probes, when the matcher itself pins it.
    ///
    /// `None` for a membership matcher over mixed-width candidates; those
    /// can only be resolved through a slot lookup.
    #[must_use]
    pub(super) fn probe_len(&self) -> Option<usize> {
        match self {
            Self::Exact { bytes, .. }
            | Self::LowerBound { bytes, .. }
            | Self::UpperBound { bytes, .. } => Some(bytes.len()),
            Self::OneOf { candidates, .. } => {
                let len = candidates.first()?.len();
                candidates.iter().all(|c| c.len() == len).then_some(len)
            }
        }
    }

    /// Evaluate against the component bytes sliced out of one candidate.
    #[must_use]
    pub fn matches_component(&self, component: &[u8]) -> bool {
        match self {
            Self::Exact { bytes, .. } => component == bytes.as_slice(),
            Self::LowerBound {
                bytes, inclusive, ..
            } => {
                if *inclusive {
                    component >= bytes.as_slice()
                } else {
                    component > bytes.as_slice()
                }
            }
            Self::UpperBound {
                bytes, inclusive, ..
            } => {
                if *inclusive {
                    component <= bytes.as_slice()
                } else {
                    component < bytes.as_slice()
                }
            }
            Self::OneOf { candidates, .. } => candidates
                .binary_search_by(|c| c.as_slice().cmp(component))
                .is_ok(),
        }
    }

    // fold-side accessors, used while absorbing partials into range bounds

    pub(super) fn exact_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Exact { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    pub(super) fn lower_bound_parts(&self) -> Option<(&[u8], bool)> {
        match self {
            Self::LowerBound {
                bytes, inclusive, ..
            } => Some((bytes, *inclusive)),
            _ => None,
        }
    }

    pub(super) fn upper_bound_parts(&self) -> Option<(&[u8], bool)> {
        match self {
            Self::UpperBound {
                bytes, inclusive, ..
            } => Some((bytes, *inclusive)),
            _ => None,
        }
    }

    pub(super) fn one_of_candidates(&self) -> Option<&[Vec<u8>]> {
        match self {
            Self::OneOf { candidates, .. } => Some(candidates),
            _ => None,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    const AT: MatchOffset = MatchOffset::Fixed(0);

    #[test]
    fn one_of_sorts_and_dedups_candidates() {
        let matcher = PartialMatcher::one_of(AT, vec![vec![3], vec![1], vec![2], vec![1]]);

        let PartialMatcher::OneOf { candidates, .. } = &matcher else {
            panic!("expected OneOf");
        };
        assert_eq!(candidates, &[vec![1], vec![2], vec![3]]);

        assert!(matcher.matches_component(&[2]));
        assert!(!matcher.matches_component(&[4]));
    }

    #[test]
    fn bounds_respect_inclusivity() {
        let inclusive = PartialMatcher::lower_bound(AT, vec![5], true);
        assert!(inclusive.matches_component(&[5]));
        assert!(!inclusive.matches_component(&[4]));

        let exclusive = PartialMatcher::lower_bound(AT, vec![5], false);
        assert!(!exclusive.matches_component(&[5]));
        assert!(exclusive.matches_component(&[6]));

        let upper = PartialMatcher::upper_bound(AT, vec![5], false);
        assert!(upper.matches_component(&[4]));
        assert!(!upper.matches_component(&[5]));
    }

    #[test]
    fn exact_compares_whole_components() {
        let matcher = PartialMatcher::exact(AT, vec![1, 2]);

        assert!(matcher.matches_component(&[1, 2]));
        assert!(!matcher.matches_component(&[1, 3]));
        assert!(!matcher.matches_component(&[1]));
    }

    #[test]
    fn probe_len_requires_uniform_candidate_widths() {
        let uniform = PartialMatcher::one_of(AT, vec![vec![1, 0], vec![2, 0]]);
        assert_eq!(uniform.probe_len(), Some(2));

        let mixed = PartialMatcher::one_of(AT, vec![vec![1], vec![2, 0]]);
        assert_eq!(mixed.probe_len(), None);

        assert_eq!(PartialMatcher::exact(AT, vec![9, 9, 9]).probe_len(), Some(3));
    }
}
