//! Module: scan
//! Responsibility: translate filter trees into byte-range scan envelopes over
//! primary keys and secondary index entries.
//! Does not own: filter construction (filter) or key and entry byte layouts
//! (model).
//! Boundary: planning is infallible; whatever cannot narrow the contiguous
//! range degrades to a residual matcher or is left to the caller's predicate.

mod matcher;
mod planner;
mod range;


pub use matcher::{MatchOffset, PartialMatcher};
pub use planner::{plan_index_scan, plan_key_scan};
pub use range::{FieldValuePair, IndexScanRange, KeyScanRange, ScanRange};
