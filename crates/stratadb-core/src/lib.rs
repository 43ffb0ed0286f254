//! Core codec for StrataDB: schema models, order-preserving scalar bytes,
//! the qualifier cell passes, and range-scan planning, with the domain
//! vocabulary exported via the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod error;
pub mod filter;
pub mod model;
pub mod obs;
pub mod qualifier;
pub mod scan;
pub mod serialize;
pub mod value;

///
/// CONSTANTS
///

/// Maximum number of parts in a composite primary key.
///
/// This limit keeps encoded keys within bounded, storable sizes and
/// simplifies offset arithmetic in the scan planner.
pub const MAX_KEY_PARTS: usize = 4;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, planners, sources, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        filter::{FilterClause, FilterCmp, FilterExpr},
        model::{FieldKind, FieldModel, RecordSchema, SchemaId, SchemaRegistry},
        qualifier::{Qualifier, Selection, StorageEntry},
        value::{Record, Value},
    };
}
