//! Module: value::ordered
//! Responsibility: fixed-width scalar byte transforms preserving order.
//! Does not own: qualifier framing or container layout.
//! Boundary: internal helpers shared by qualifiers, keys, and scan bounds.

const SIGN_32: u32 = 1u32 << 31;
const SIGN_64: u64 = 1u64 << 63;

pub(crate) const fn ordered_i32_bytes(value: i32) -> [u8; 4] {
    let biased = value.cast_unsigned() ^ SIGN_32;
    biased.to_be_bytes()
}

pub(crate) const fn i32_from_ordered(bytes: [u8; 4]) -> i32 {
    (u32::from_be_bytes(bytes) ^ SIGN_32).cast_signed()
}

pub(crate) const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    let biased = value.cast_unsigned() ^ SIGN_64;
    biased.to_be_bytes()
}

pub(crate) const fn i64_from_ordered(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_64).cast_signed()
}

pub(crate) const fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_64 == 0 { bits ^ SIGN_64 } else { !bits };

    ordered.to_be_bytes()
}

pub(crate) const fn f64_from_ordered(bytes: [u8; 8]) -> f64 {
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered & SIGN_64 == 0 {
        !ordered
    } else {
        ordered ^ SIGN_64
    };

    f64::from_bits(bits)
}

/// Append `raw` as an ordered prefix varint.
///
/// Encoded bytes compare lexicographically in the same order as the raw
/// values, across lengths as well as within one. Capacity is 35 bits;
/// callers keep inputs below that.
pub(crate) fn push_ordered_varint(out: &mut Vec<u8>, raw: u64) {
    debug_assert!(raw < 1 << 35, "ordered varint input exceeds 35 bits");

    if raw < 1 << 7 {
        out.push(raw as u8);
    } else if raw < 1 << 14 {
        out.push(0b1000_0000 | (raw >> 8) as u8);
        out.push(raw as u8);
    } else if raw < 1 << 21 {
        out.push(0b1100_0000 | (raw >> 16) as u8);
        out.push((raw >> 8) as u8);
        out.push(raw as u8);
    } else if raw < 1 << 28 {
        out.push(0b1110_0000 | (raw >> 24) as u8);
        out.push((raw >> 16) as u8);
        out.push((raw >> 8) as u8);
        out.push(raw as u8);
    } else {
        out.push(0b1111_0000 | (raw >> 32) as u8);
        out.push((raw >> 24) as u8);
        out.push((raw >> 16) as u8);
        out.push((raw >> 8) as u8);
        out.push(raw as u8);
    }
}

/// Append a byte length as an ordered prefix varint.
pub(crate) fn push_length_prefix(out: &mut Vec<u8>, len: usize) {
    #[allow(clippy::cast_possible_truncation)]
    push_ordered_varint(out, len as u64);
}

/// Byte length `raw` occupies as an ordered prefix varint.
pub(crate) const fn ordered_varint_len(raw: u64) -> usize {
    if raw < 1 << 7 {
        1
    } else if raw < 1 << 14 {
        2
    } else if raw < 1 << 21 {
        3
    } else if raw < 1 << 28 {
        4
    } else {
        5
    }
}

/// Read one ordered prefix varint from the front of `bytes`.
///
/// Returns the decoded value and the number of bytes consumed. `None`
/// covers truncation, an invalid header byte, and values not written in
/// their shortest form.
pub(crate) fn read_ordered_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let first = *bytes.first()?;

    let (len, seed) = if first < 0b1000_0000 {
        (1, u64::from(first))
    } else if first < 0b1100_0000 {
        (2, u64::from(first & 0b0011_1111))
    } else if first < 0b1110_0000 {
        (3, u64::from(first & 0b0001_1111))
    } else if first < 0b1111_0000 {
        (4, u64::from(first & 0b0000_1111))
    } else if first < 0b1111_1000 {
        (5, u64::from(first & 0b0000_0111))
    } else {
        return None;
    };

    if bytes.len() < len {
        return None;
    }

    let mut value = seed;
    for byte in &bytes[1..len] {
        value = (value << 8) | u64::from(*byte);
    }

    // shortest form only
    if ordered_varint_len(value) != len {
        return None;
    }

    Some((value, len))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_transforms_freeze_golden_bytes() {
        assert_eq!(ordered_i32_bytes(0), [0x80, 0x00, 0x00, 0x00]);
        assert_eq!(ordered_i32_bytes(-1), [0x7F, 0xFF, 0xFF, 0xFF]);
        assert_eq!(ordered_i32_bytes(i32::MIN), [0x00, 0x00, 0x00, 0x00]);
        assert_eq!(ordered_i32_bytes(i32::MAX), [0xFF, 0xFF, 0xFF, 0xFF]);

        assert_eq!(
            ordered_i64_bytes(5),
            [0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05]
        );
    }

    #[test]
    fn signed_transforms_round_trip() {
        for v in [i64::MIN, -77, -1, 0, 1, 42, i64::MAX] {
            assert_eq!(i64_from_ordered(ordered_i64_bytes(v)), v);
        }
        for v in [i32::MIN, -9, 0, 3, i32::MAX] {
            assert_eq!(i32_from_ordered(ordered_i32_bytes(v)), v);
        }
    }

    #[test]
    fn signed_byte_order_tracks_numeric_order() {
        let samples = [i64::MIN, -100, -1, 0, 1, 7, 3_000_000, i64::MAX];
        for pair in samples.windows(2) {
            assert!(
                ordered_i64_bytes(pair[0]) < ordered_i64_bytes(pair[1]),
                "{} should order below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn float_transform_round_trips_and_orders() {
        let samples = [-1.0e9, -2.5, -0.0, 0.0, 1.0e-3, 3.75, 6.4e12];
        for v in samples {
            assert_eq!(f64_from_ordered(ordered_f64_bytes(v)).to_bits(), v.to_bits());
        }

        let ordered = [-1.0e9, -2.5, 0.0, 1.0e-3, 3.75, 6.4e12];
        for pair in ordered.windows(2) {
            assert!(ordered_f64_bytes(pair[0]) < ordered_f64_bytes(pair[1]));
        }
    }

    fn varint_bytes(raw: u64) -> Vec<u8> {
        let mut out = Vec::new();
        push_ordered_varint(&mut out, raw);
        out
    }

    #[test]
    fn varint_freezes_length_boundaries() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(0x7F), vec![0x7F]);
        assert_eq!(varint_bytes(0x80), vec![0x80, 0x80]);
        assert_eq!(varint_bytes(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(varint_bytes(0x4000), vec![0xC0, 0x40, 0x00]);
        assert_eq!(varint_bytes(0x001F_FFFF), vec![0xDF, 0xFF, 0xFF]);
        assert_eq!(varint_bytes(0x0020_0000), vec![0xE0, 0x20, 0x00, 0x00]);
        assert_eq!(varint_bytes(0x0FFF_FFFF), vec![0xEF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(varint_bytes(0x1000_0000), vec![0xF0, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(
            varint_bytes((1 << 35) - 1),
            vec![0xF7, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn varint_round_trips_with_consumed_length() {
        for raw in [0, 1, 0x7F, 0x80, 300, 0x3FFF, 0x4000, 99_999, 1 << 30] {
            let mut bytes = varint_bytes(raw);
            bytes.extend_from_slice(&[0xAA, 0xBB]);

            let (value, consumed) = read_ordered_varint(&bytes).unwrap();
            assert_eq!(value, raw);
            assert_eq!(consumed, ordered_varint_len(raw));
        }
    }

    #[test]
    fn varint_byte_order_tracks_numeric_order() {
        let samples = [0, 1, 0x7E, 0x7F, 0x80, 0x81, 0x3FFF, 0x4000, 1 << 20, 1 << 34];
        for pair in samples.windows(2) {
            assert!(
                varint_bytes(pair[0]) < varint_bytes(pair[1]),
                "{} should order below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn varint_rejects_padded_and_truncated_input() {
        // 0x05 padded into two bytes
        assert_eq!(read_ordered_varint(&[0x80, 0x05]), None);
        // header promises two bytes, only one present
        assert_eq!(read_ordered_varint(&[0x81]), None);
        // invalid header byte
        assert_eq!(read_ordered_varint(&[0xF8, 0x00, 0x00, 0x00, 0x00]), None);
        assert_eq!(read_ordered_varint(&[]), None);
    }
}
