//! Module: qualifier
//! Responsibility: the storage cell addressing model (qualifiers, storage
//! kinds, cell values, property paths) and the encode/decode/change passes
//! over it.
//! Does not own: schema declarations (model), scalar byte forms (value),
//! range planning (scan).
//! Boundary: byte-lexicographic qualifier order equals logical record order;
//! every pass here depends on that invariant.

pub(crate) mod segment;

mod changes;
mod decode;
mod encode;

#[cfg(test)]
mod tests;

pub use changes::{RecordChange, VersionedChanges, decode_changes};
pub use decode::decode_record;
pub use encode::{encode_entries, encode_record};
pub use segment::RefTag;

use crate::{error::CodecError, model::FieldKind, value::Value};
use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

///
/// Qualifier
/// byte address of one storage cell within a record's key space
///

#[derive(
    Clone, Debug, Default, Deref, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
    Deserialize,
)]
pub struct Qualifier(#[serde(with = "serde_bytes")] Vec<u8>);

impl Qualifier {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length of the byte prefix shared with `other`.
    pub(crate) fn shared_prefix_len(&self, other: &[u8]) -> usize {
        self.0
            .iter()
            .zip(other)
            .take_while(|(a, b)| a == b)
            .count()
    }
}

///
/// StorageKind
///
/// What a stored cell holds at its qualifier. The engine persists cells
/// keyed by qualifier; the kind tells it which column family / value codec
/// applies and tells sources which read to perform.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum StorageKind {
    /// scalar leaf value, including container items
    Value,
    /// list length marker
    ListSize,
    /// set length marker
    SetSize,
    /// map length marker
    MapSize,
    /// typed discriminator, possibly carrying an inline scalar payload
    TypeValue,
    /// embedded record existence marker, cell is `unit`
    Embed,
    /// soft-delete marker, cell is a bool scalar
    ObjectDelete,
}

impl StorageKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::ListSize => "list_size",
            Self::SetSize => "set_size",
            Self::MapSize => "map_size",
            Self::TypeValue => "type_value",
            Self::Embed => "embed",
            Self::ObjectDelete => "object_delete",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

///
/// CellValue
/// the payload stored at one qualifier
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// container length
    Count(u32),

    /// scalar payload
    Scalar(Value),

    /// typed discriminator; `value` is inline only for scalar payloads
    Typed { variant: u32, value: Option<Value> },
}

impl CellValue {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Scalar(_) => "scalar",
            Self::Typed { .. } => "typed",
        }
    }
}

///
/// StorageEntry
/// one encoder emission: address, kind, payload
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub qualifier: Qualifier,
    pub kind: StorageKind,
    pub value: CellValue,
}

impl StorageEntry {
    #[must_use]
    pub fn new(qualifier: impl Into<Qualifier>, kind: StorageKind, value: CellValue) -> Self {
        Self {
            qualifier: qualifier.into(),
            kind,
            value,
        }
    }
}

///
/// PathStep
/// one hop of a property path through a structured record
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PathStep {
    /// record field by property index
    Field(u32),
    /// list item by position
    ListItem(u32),
    /// set item by value
    SetItem(Value),
    /// map entry by key
    MapKey(Value),
    /// typed payload under a variant
    Variant(u32),
}

///
/// PropertyPath
/// full path from the record root to one addressable position
///

#[derive(Clone, Debug, Default, Deref, Eq, From, PartialEq, Serialize, Deserialize)]
pub struct PropertyPath(Vec<PathStep>);

impl PropertyPath {
    #[must_use]
    pub fn root(field: u32) -> Self {
        Self(vec![PathStep::Field(field)])
    }

    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    #[must_use]
    pub fn into_steps(self) -> Vec<PathStep> {
        self.0
    }

    /// This path extended by one step.
    #[must_use]
    pub(crate) fn child(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }
}

///
/// Selection
///
/// Field mask applied during decode. Unselected subtrees are skipped
/// without reading their cells.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    All,
    Fields(BTreeMap<u32, Selection>),
}

impl Selection {
    /// Select exactly `indexes`, whole subtrees included.
    #[must_use]
    pub fn of(indexes: impl IntoIterator<Item = u32>) -> Self {
        Self::Fields(indexes.into_iter().map(|i| (i, Self::All)).collect())
    }

    /// Select fields with per-field sub-selections.
    #[must_use]
    pub fn fields(entries: impl IntoIterator<Item = (u32, Self)>) -> Self {
        Self::Fields(entries.into_iter().collect())
    }

    #[must_use]
    pub fn includes(&self, field: u32) -> bool {
        match self {
            Self::All => true,
            Self::Fields(map) => map.contains_key(&field),
        }
    }

    /// Sub-selection applying below `field`, `None` when excluded.
    #[must_use]
    pub fn narrow(&self, field: u32) -> Option<&Self> {
        match self {
            Self::All => Some(self),
            Self::Fields(map) => map.get(&field),
        }
    }
}

///
/// ValueSource
///
/// Pull interface a decode pass consumes. `next_qualifier` yields stored
/// qualifiers in strictly ascending byte order; `read_cell` returns the
/// cell stored at the qualifier most recently yielded, `None` for a stored
/// null (a deletion that kept its address).
///

pub trait ValueSource {
    fn next_qualifier(&mut self) -> Option<Qualifier>;

    fn read_cell(
        &mut self,
        kind: StorageKind,
        field: &FieldKind,
    ) -> Result<Option<CellValue>, CodecError>;
}

///
/// ChangeSource
///
/// Pull interface for change reconstruction. Every stored qualifier carries
/// a version; the cell itself may be a stored null (a versioned deletion).
///

pub trait ChangeSource {
    fn next_qualifier(&mut self) -> Option<Qualifier>;

    fn read_versioned_cell(
        &mut self,
        kind: StorageKind,
        field: &FieldKind,
    ) -> Result<(u64, Option<CellValue>), CodecError>;
}

///
/// EntrySource
///
/// In-memory `ValueSource` over a cell list, sorted on construction.
/// The storage kind requested by the decoder is checked against the stored
/// kind, so decode tests double as contract tests.
///

pub struct EntrySource {
    cells: Vec<(Qualifier, StorageKind, Option<CellValue>)>,
    cursor: usize,
}

impl EntrySource {
    #[must_use]
    pub fn from_entries(entries: Vec<StorageEntry>) -> Self {
        Self::from_cells(
            entries
                .into_iter()
                .map(|e| (e.qualifier, e.kind, Some(e.value)))
                .collect(),
        )
    }

    #[must_use]
    pub fn from_cells(mut cells: Vec<(Qualifier, StorageKind, Option<CellValue>)>) -> Self {
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        Self { cells, cursor: 0 }
    }

    fn current(&self) -> Result<&(Qualifier, StorageKind, Option<CellValue>), CodecError> {
        self.cursor
            .checked_sub(1)
            .and_then(|pos| self.cells.get(pos))
            .ok_or_else(|| {
                CodecError::storage(
                    crate::error::ErrorOrigin::Decode,
                    "cell read before any qualifier was yielded",
                )
            })
    }
}

impl ValueSource for EntrySource {
    fn next_qualifier(&mut self) -> Option<Qualifier> {
        let qualifier = self.cells.get(self.cursor)?.0.clone();
        self.cursor += 1;
        Some(qualifier)
    }

    fn read_cell(
        &mut self,
        kind: StorageKind,
        _field: &FieldKind,
    ) -> Result<Option<CellValue>, CodecError> {
        let (qualifier, stored_kind, value) = self.current()?;

        if *stored_kind != kind {
            return Err(CodecError::storage(
                crate::error::ErrorOrigin::Decode,
                format!(
                    "cell at {:?} stored as {stored_kind}, read as {kind}",
                    qualifier.as_bytes()
                ),
            ));
        }

        Ok(value.clone())
    }
}

///
/// VersionedEntrySource
/// in-memory `ChangeSource` over `(qualifier, kind, version, cell)` rows
///

pub struct VersionedEntrySource {
    cells: Vec<(Qualifier, StorageKind, u64, Option<CellValue>)>,
    cursor: usize,
}

impl VersionedEntrySource {
    #[must_use]
    pub fn from_cells(mut cells: Vec<(Qualifier, StorageKind, u64, Option<CellValue>)>) -> Self {
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        Self { cells, cursor: 0 }
    }
}

impl ChangeSource for VersionedEntrySource {
    fn next_qualifier(&mut self) -> Option<Qualifier> {
        let qualifier = self.cells.get(self.cursor)?.0.clone();
        self.cursor += 1;
        Some(qualifier)
    }

    fn read_versioned_cell(
        &mut self,
        kind: StorageKind,
        _field: &FieldKind,
    ) -> Result<(u64, Option<CellValue>), CodecError> {
        let (qualifier, stored_kind, version, value) = self
            .cursor
            .checked_sub(1)
            .and_then(|pos| self.cells.get(pos))
            .ok_or_else(|| {
                CodecError::storage(
                    crate::error::ErrorOrigin::Changes,
                    "cell read before any qualifier was yielded",
                )
            })?;

        if *stored_kind != kind {
            return Err(CodecError::storage(
                crate::error::ErrorOrigin::Changes,
                format!(
                    "cell at {:?} stored as {stored_kind}, read as {kind}",
                    qualifier.as_bytes()
                ),
            ));
        }

        Ok((*version, value.clone()))
    }
}
