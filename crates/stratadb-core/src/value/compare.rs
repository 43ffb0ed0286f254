use crate::value::{Record, Value};
use std::cmp::Ordering;

/// Total canonical comparator used by encoder sorting, map normalization,
/// and planner candidate ordering.
///
/// Ordering rules:
/// 1. Canonical variant rank
/// 2. Variant-specific comparison for same-ranked values
///
/// Mixed-variant comparisons are rank-only and must remain deterministic.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.canonical_rank().cmp(&right.canonical_rank());
    if rank != Ordering::Equal {
        return rank;
    }

    canonical_cmp_same_rank(left, right)
}

/// Strict comparator for identical orderable scalar variants.
///
/// Returns `None` for mismatched or non-orderable variants.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Ulid(a), Value::Ulid(b)) => Some(a.cmp(b)),
        (Value::Unit, Value::Unit) => Some(Ordering::Equal),
        _ => None,
    }
}

fn canonical_cmp_same_rank(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
        (Value::Ulid(a), Value::Ulid(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => {
            canonical_cmp_value_list(a, b)
        }
        (Value::Map(a), Value::Map(b)) => canonical_cmp_value_map(a, b),
        (Value::Embed(a), Value::Embed(b)) => canonical_cmp_record(a, b),
        (
            Value::Typed {
                variant: va,
                value: a,
            },
            Value::Typed {
                variant: vb,
                value: b,
            },
        ) => va.cmp(vb).then_with(|| canonical_cmp(a, b)),
        (Value::Unit, Value::Unit) => Ordering::Equal,
        _ => Ordering::Equal,
    }
}

fn canonical_cmp_value_list(left: &[Value], right: &[Value]) -> Ordering {
    for (left, right) in left.iter().zip(right.iter()) {
        let cmp = canonical_cmp(left, right);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    left.len().cmp(&right.len())
}

fn canonical_cmp_value_map(left: &[(Value, Value)], right: &[(Value, Value)]) -> Ordering {
    for ((left_key, left_value), (right_key, right_value)) in left.iter().zip(right.iter()) {
        let key_cmp = canonical_cmp(left_key, right_key);
        if key_cmp != Ordering::Equal {
            return key_cmp;
        }

        let value_cmp = canonical_cmp(left_value, right_value);
        if value_cmp != Ordering::Equal {
            return value_cmp;
        }
    }

    left.len().cmp(&right.len())
}

fn canonical_cmp_record(left: &Record, right: &Record) -> Ordering {
    for ((left_index, left_value), (right_index, right_value)) in
        left.iter().zip(right.iter())
    {
        let index_cmp = left_index.cmp(right_index);
        if index_cmp != Ordering::Equal {
            return index_cmp;
        }

        let value_cmp = canonical_cmp(left_value, right_value);
        if value_cmp != Ordering::Equal {
            return value_cmp;
        }
    }

    left.len()
        .cmp(&right.len())
        .then_with(|| left.soft_deleted().cmp(&right.soft_deleted()))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_canonical_order_matches_native_order() {
        assert_eq!(
            canonical_cmp(&Value::Int(-5), &Value::Int(9)),
            Ordering::Less
        );
        assert_eq!(
            canonical_cmp(&Value::Text("ab".into()), &Value::Text("b".into())),
            Ordering::Less
        );
    }

    #[test]
    fn mixed_variants_compare_by_rank_only() {
        assert_eq!(
            canonical_cmp(&Value::Bool(true), &Value::Int(0)),
            Ordering::Less
        );
        assert_eq!(
            canonical_cmp(&Value::Map(vec![]), &Value::List(vec![])),
            Ordering::Greater
        );
    }

    #[test]
    fn strict_order_rejects_mismatched_variants() {
        assert!(strict_order_cmp(&Value::Int(1), &Value::Uint(1)).is_none());
        assert_eq!(
            strict_order_cmp(&Value::Uint(3), &Value::Uint(4)),
            Some(Ordering::Less)
        );
    }
}
