//! ## Crate layout
//! - `core`: schema models, ordered scalar bytes, the qualifier cell passes,
//!   change replay, and range-scan planning.
//!
//! The `prelude` module mirrors the surface callers use when declaring
//! schemas, running codec passes, and planning scans.

pub use stratadb_core as core;

pub use stratadb_core::error::CodecError;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        filter::{FilterClause, FilterCmp, FilterExpr},
        model::{
            ComponentWidth, FieldKind, FieldModel, IndexLayout, KeyLayout, RecordSchema,
            SchemaId, SchemaRegistry, TypeVariant,
        },
        qualifier::{
            CellValue, ChangeSource, EntrySource, PathStep, PropertyPath, Qualifier,
            RecordChange, Selection, StorageEntry, StorageKind, ValueSource, VersionedChanges,
            VersionedEntrySource, decode_changes, decode_record, encode_entries, encode_record,
        },
        scan::{
            FieldValuePair, IndexScanRange, KeyScanRange, ScanRange, plan_index_scan,
            plan_key_scan,
        },
        value::{Record, Value},
    };
    pub use serde::{Deserialize, Serialize};
}
