//! Module: qualifier::segment
//! Responsibility: path segment framing, reference-type tags, and special
//! marker bytes
//! Does not own: which segments legally follow one another (qualifier::decode)
//! Boundary: the byte layout here is persisted format; any change breaks
//! stored data

use crate::{
    error::{CodecError, ErrorOrigin},
    value::{push_ordered_varint, read_ordered_varint},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Secondary byte of a special segment marking record soft-deletion.
pub(crate) const DELETE_MARKER: u8 = 0;

/// Secondary byte of a special segment addressing a map key.
///
/// Reserved: planners and change requests may address keys this way, stored
/// cells never carry it.
pub(crate) const MAP_KEY_MARKER: u8 = 1;

/// Byte width of a list item index suffix.
pub(crate) const LIST_INDEX_SIZE: usize = 4;

///
/// RefTag
///
/// The 3-bit reference-type tag carried in the low bits of every path
/// segment. Tag 7 is unassigned and always malformed.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RefTag {
    Special = 0,
    Value = 1,
    List = 2,
    Set = 3,
    Map = 4,
    Type = 5,
    Embed = 6,
}

impl RefTag {
    pub(crate) const fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            0 => Some(Self::Special),
            1 => Some(Self::Value),
            2 => Some(Self::List),
            3 => Some(Self::Set),
            4 => Some(Self::Map),
            5 => Some(Self::Type),
            6 => Some(Self::Embed),
            _ => None,
        }
    }

    pub(crate) const fn bits(self) -> u64 {
        self as u64
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Special => "special",
            Self::Value => "value",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Type => "type",
            Self::Embed => "embed",
        }
    }
}

impl fmt::Display for RefTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

///
/// Segment
/// one decoded path segment header
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Segment {
    pub property: u32,
    pub tag: RefTag,
}

/// Append the segment for `(property, tag)`.
pub(crate) fn push_segment(out: &mut Vec<u8>, property: u32, tag: RefTag) {
    push_ordered_varint(out, (u64::from(property) << 3) | tag.bits());
}

/// Read one segment header from the front of `bytes`.
///
/// Returns the segment and the number of bytes consumed.
pub(crate) fn read_segment(
    bytes: &[u8],
    origin: ErrorOrigin,
) -> Result<(Segment, usize), CodecError> {
    let (raw, consumed) = read_ordered_varint(bytes).ok_or_else(|| {
        CodecError::malformed_qualifier(origin, "truncated or non-canonical segment varint")
    })?;

    let tag = RefTag::from_bits(raw & 0b111).ok_or_else(|| {
        CodecError::malformed_qualifier(origin, "reference-type tag 7 is unassigned")
    })?;

    let property = u32::try_from(raw >> 3).map_err(|_| {
        CodecError::malformed_qualifier(origin, "property index exceeds 32 bits")
    })?;

    Ok((Segment { property, tag }, consumed))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_bytes(property: u32, tag: RefTag) -> Vec<u8> {
        let mut out = Vec::new();
        push_segment(&mut out, property, tag);
        out
    }

    #[test]
    fn segments_round_trip_property_and_tag() {
        for property in [0, 1, 2, 15, 16, 300, 70_000, u32::MAX] {
            for tag in [RefTag::Value, RefTag::Map, RefTag::Embed] {
                let bytes = segment_bytes(property, tag);
                let (segment, consumed) = read_segment(&bytes, ErrorOrigin::Decode).unwrap();

                assert_eq!(segment.property, property);
                assert_eq!(segment.tag, tag);
                assert_eq!(consumed, bytes.len());
            }
        }
    }

    #[test]
    fn low_property_segments_stay_single_byte() {
        // 15 << 3 | 6 = 126, still below the one-byte ceiling
        assert_eq!(segment_bytes(15, RefTag::Embed).len(), 1);
        assert_eq!(segment_bytes(16, RefTag::Special).len(), 2);
    }

    #[test]
    fn segment_order_follows_property_then_tag() {
        let mut previous = segment_bytes(0, RefTag::Special);
        for property in [0, 1, 2, 20, 500] {
            for tag in [
                RefTag::Special,
                RefTag::Value,
                RefTag::List,
                RefTag::Set,
                RefTag::Map,
                RefTag::Type,
                RefTag::Embed,
            ] {
                let current = segment_bytes(property, tag);
                assert!(current >= previous, "{property}|{tag} regressed the order");
                previous = current;
            }
        }
    }

    #[test]
    fn unassigned_tag_is_malformed() {
        // property 0 with tag bits 7
        let err = read_segment(&[0x07], ErrorOrigin::Decode).unwrap_err();
        assert!(err.to_string().contains("tag 7"));
    }

    #[test]
    fn truncated_segment_is_malformed() {
        let err = read_segment(&[0x80], ErrorOrigin::Decode).unwrap_err();
        assert!(err.to_string().contains("segment varint"));
    }
}
