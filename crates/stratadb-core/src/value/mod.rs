mod compare;
mod float;
mod ordered;
mod ulid;

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

// re-exports
pub use compare::{canonical_cmp, strict_order_cmp};
pub use float::Float64;
pub use ulid::{Ulid, UlidDecodeError};

pub(crate) use ordered::{
    f64_from_ordered, i32_from_ordered, i64_from_ordered, ordered_f64_bytes, ordered_i32_bytes,
    ordered_i64_bytes, ordered_varint_len, push_length_prefix, push_ordered_varint,
    read_ordered_varint,
};

///
/// MapValueError
///
/// Invariant violations for `Value::Map` construction/normalization.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MapValueError {
    NonScalarKey {
        index: usize,
        key: &'static str,
    },
    DuplicateKey {
        left_index: usize,
        right_index: usize,
    },
}

impl std::fmt::Display for MapValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonScalarKey { index, key } => {
                write!(f, "map key at index {index} is not scalar: {key}")
            }
            Self::DuplicateKey {
                left_index,
                right_index,
            } => write!(
                f,
                "map contains duplicate keys at normalized positions {left_index} and {right_index}"
            ),
        }
    }
}

impl std::error::Error for MapValueError {}

///
/// Value
///
/// Runtime value for one record field: scalar leaves plus the container
/// shapes the qualifier codec knows how to address.
///
/// NOTE: `PartialOrd`/`Ord` are deliberately not derived; `canonical_cmp`
/// is the one comparator and derive order would silently disagree with it.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int(i64),
    Uint(u64),
    Float(Float64),
    Text(String),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Ulid(Ulid),
    Unit,
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Embed(Record),
    Typed { variant: u32, value: Box<Value> },
}

impl Value {
    /// Construct a finite float value.
    #[must_use]
    pub fn float(v: f64) -> Option<Self> {
        Float64::try_new(v).map(Self::Float)
    }

    /// Construct a normalized map value: entries sorted by canonical key
    /// order, duplicate keys rejected.
    pub fn from_map(entries: Vec<(Self, Self)>) -> Result<Self, MapValueError> {
        Ok(Self::Map(normalize_map_entries(entries)?))
    }

    /// Construct a normalized set value: items sorted canonically, duplicates
    /// collapsed.
    #[must_use]
    pub fn from_set(mut items: Vec<Self>) -> Self {
        items.sort_by(canonical_cmp);
        items.dedup_by(|a, b| canonical_cmp(a, b) == Ordering::Equal);

        Self::Set(items)
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_)
                | Self::Int32(_)
                | Self::Int(_)
                | Self::Uint(_)
                | Self::Float(_)
                | Self::Text(_)
                | Self::Bytes(_)
                | Self::Ulid(_)
                | Self::Unit
        )
    }

    #[must_use]
    pub const fn variant_label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Ulid(_) => "ulid",
            Self::Unit => "unit",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Embed(_) => "embed",
            Self::Typed { .. } => "typed",
        }
    }

    /// Canonical family rank; the first round of `canonical_cmp`.
    #[must_use]
    pub(crate) const fn canonical_rank(&self) -> u8 {
        match self {
            Self::Unit => 0,
            Self::Bool(_) => 1,
            Self::Int32(_) => 2,
            Self::Int(_) => 3,
            Self::Uint(_) => 4,
            Self::Float(_) => 5,
            Self::Text(_) => 6,
            Self::Bytes(_) => 7,
            Self::Ulid(_) => 8,
            Self::List(_) => 9,
            Self::Set(_) => 10,
            Self::Map(_) => 11,
            Self::Embed(_) => 12,
            Self::Typed { .. } => 13,
        }
    }

    /// Storage byte length of a scalar; `None` for containers.
    #[must_use]
    pub fn storage_byte_len(&self) -> Option<usize> {
        let len = match self {
            Self::Bool(_) => 1,
            Self::Int32(_) => 4,
            Self::Int(_) | Self::Uint(_) | Self::Float(_) => 8,
            Self::Ulid(_) => Ulid::STORED_SIZE,
            Self::Text(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::Unit => 0,
            _ => return None,
        };

        Some(len)
    }

    /// Append the order-preserving storage bytes of a scalar.
    ///
    /// Returns the number of bytes written, or `None` for containers. The
    /// same bytes serve qualifiers, primary keys, and index components, so
    /// byte order here must mirror `canonical_cmp` for every scalar kind.
    pub fn write_storage_bytes(&self, out: &mut Vec<u8>) -> Option<usize> {
        let before = out.len();

        match self {
            Self::Bool(v) => out.push(u8::from(*v)),
            Self::Int32(v) => out.extend_from_slice(&ordered_i32_bytes(*v)),
            Self::Int(v) => out.extend_from_slice(&ordered_i64_bytes(*v)),
            Self::Uint(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Float(v) => out.extend_from_slice(&ordered_f64_bytes(v.get())),
            Self::Text(s) => out.extend_from_slice(s.as_bytes()),
            Self::Bytes(b) => out.extend_from_slice(b),
            Self::Ulid(u) => out.extend_from_slice(&u.to_bytes()),
            Self::Unit => {}
            _ => return None,
        }

        Some(out.len() - before)
    }

    /// Storage bytes of a scalar as an owned buffer; `None` for containers.
    #[must_use]
    pub fn storage_bytes(&self) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(self.storage_byte_len().unwrap_or_default());
        self.write_storage_bytes(&mut out).map(|_| out)
    }

    /// Sorted insert into a live map container.
    ///
    /// Returns false when `self` is not a map. An existing entry for the same
    /// key is replaced rather than duplicated.
    pub(crate) fn insert_map_entry(&mut self, key: Self, value: Self) -> bool {
        let Self::Map(entries) = self else {
            return false;
        };

        match entries.binary_search_by(|(k, _)| canonical_cmp(k, &key)) {
            Ok(i) => entries[i].1 = value,
            Err(i) => entries.insert(i, (key, value)),
        }

        true
    }

    /// Sorted insert into a live set container; duplicates are dropped.
    pub(crate) fn insert_set_item(&mut self, item: Self) -> bool {
        let Self::Set(items) = self else {
            return false;
        };

        if let Err(i) = items.binary_search_by(|v| canonical_cmp(v, &item)) {
            items.insert(i, item);
        }

        true
    }

    /// Positional insert into a live list container.
    ///
    /// Qualifier streams deliver list items in ascending index order, so the
    /// common case is an append; a repeated index replaces in place.
    pub(crate) fn push_list_item(&mut self, index: u32, item: Self) -> bool {
        let Self::List(items) = self else {
            return false;
        };

        let index = index as usize;
        if index < items.len() {
            items[index] = item;
        } else {
            items.push(item);
        }

        true
    }
}

/// Normalize map entries: canonical key order, scalar keys only, duplicates
/// rejected.
pub fn normalize_map_entries(
    mut entries: Vec<(Value, Value)>,
) -> Result<Vec<(Value, Value)>, MapValueError> {
    for (index, (key, _)) in entries.iter().enumerate() {
        if !key.is_scalar() {
            return Err(MapValueError::NonScalarKey {
                index,
                key: key.variant_label(),
            });
        }
    }

    entries.sort_by(|(a, _), (b, _)| canonical_cmp(a, b));

    for (right_index, window) in entries.windows(2).enumerate() {
        if canonical_cmp(&window[0].0, &window[1].0) == Ordering::Equal {
            return Err(MapValueError::DuplicateKey {
                left_index: right_index,
                right_index: right_index + 1,
            });
        }
    }

    Ok(entries)
}

macro_rules! impl_from_for {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v.into())
            }
        }
    };
}

impl_from_for!(Bool, bool);
impl_from_for!(Int32, i32);
impl_from_for!(Int, i64);
impl_from_for!(Uint, u64);
impl_from_for!(Float, Float64);
impl_from_for!(Text, String);
impl_from_for!(Text, &str);
impl_from_for!(Bytes, Vec<u8>);
impl_from_for!(Ulid, Ulid);

///
/// Record
///
/// Ordered property-index → value table; the decoded form of one stored
/// record. `soft_deleted` mirrors the stored delete marker.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<u32, Value>,
    soft_deleted: bool,
}

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            soft_deleted: false,
        }
    }

    pub fn insert(&mut self, index: u32, value: Value) -> Option<Value> {
        self.fields.insert(index, value)
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&Value> {
        self.fields.get(&index)
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> Option<&mut Value> {
        self.fields.get_mut(&index)
    }

    pub fn remove(&mut self, index: u32) -> Option<Value> {
        self.fields.remove(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &Value)> {
        self.fields.iter()
    }

    #[must_use]
    pub const fn soft_deleted(&self) -> bool {
        self.soft_deleted
    }

    pub const fn set_soft_deleted(&mut self, deleted: bool) {
        self.soft_deleted = deleted;
    }
}

impl FromIterator<(u32, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (u32, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            soft_deleted: false,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_map_normalizes_key_order_and_rejects_duplicates() {
        let map = Value::from_map(vec![
            (Value::from("b"), Value::Int(2)),
            (Value::from("a"), Value::Int(1)),
        ])
        .unwrap();

        let Value::Map(entries) = &map else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, Value::from("a"));
        assert_eq!(entries[1].0, Value::from("b"));

        let err = Value::from_map(vec![
            (Value::from("a"), Value::Int(1)),
            (Value::from("a"), Value::Int(2)),
        ])
        .unwrap_err();
        assert!(matches!(err, MapValueError::DuplicateKey { .. }));
    }

    #[test]
    fn from_map_rejects_container_keys() {
        let err = Value::from_map(vec![(Value::List(vec![]), Value::Int(1))]).unwrap_err();
        assert!(matches!(err, MapValueError::NonScalarKey { index: 0, .. }));
    }

    #[test]
    fn from_set_sorts_and_dedups() {
        let set = Value::from_set(vec![Value::Int(3), Value::Int(1), Value::Int(3)]);
        assert_eq!(set, Value::Set(vec![Value::Int(1), Value::Int(3)]));
    }

    #[test]
    fn scalar_storage_bytes_have_declared_lengths() {
        let samples = [
            Value::Bool(true),
            Value::Int32(-4),
            Value::Int(99),
            Value::Uint(7),
            Value::float(2.5).unwrap(),
            Value::from("hi"),
            Value::Bytes(vec![1, 2, 3]),
            Value::Ulid(Ulid::from_u128(42)),
            Value::Unit,
        ];

        for value in samples {
            let bytes = value.storage_bytes().unwrap();
            assert_eq!(Some(bytes.len()), value.storage_byte_len(), "{value:?}");
        }

        assert!(Value::List(vec![]).storage_bytes().is_none());
    }

    #[test]
    fn structured_values_survive_a_serde_json_round_trip() {
        // exercises the hand-written serde impls: Ulid as a Crockford
        // string, Float64 with its finite check, Bytes through serde_bytes
        let value = Value::Map(vec![
            (
                Value::from("ids"),
                Value::Set(vec![Value::Ulid(Ulid::from_u128(42))]),
            ),
            (Value::from("raw"), Value::Bytes(vec![0, 7, 255])),
            (Value::from("score"), Value::float(2.5).unwrap()),
        ]);

        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn live_container_inserts_keep_canonical_order() {
        let mut map = Value::Map(vec![]);
        assert!(map.insert_map_entry(Value::from("b"), Value::Int(2)));
        assert!(map.insert_map_entry(Value::from("a"), Value::Int(1)));
        assert!(map.insert_map_entry(Value::from("b"), Value::Int(5)));

        assert_eq!(
            map,
            Value::Map(vec![
                (Value::from("a"), Value::Int(1)),
                (Value::from("b"), Value::Int(5)),
            ])
        );

        let mut set = Value::Set(vec![]);
        assert!(set.insert_set_item(Value::Int(9)));
        assert!(set.insert_set_item(Value::Int(4)));
        assert!(set.insert_set_item(Value::Int(9)));
        assert_eq!(set, Value::Set(vec![Value::Int(4), Value::Int(9)]));

        assert!(!Value::Unit.insert_set_item(Value::Int(0)));
    }
}
