use super::{full_record, profile_registry, root_qualifier};
use crate::{
    qualifier::{
        CellValue, EntrySource, Qualifier, RefTag, Selection, StorageKind, decode_record,
        encode_entries,
    },
    value::{Record, Value, push_length_prefix},
};

#[test]
fn every_field_shape_survives_encode_then_decode() {
    let (registry, id) = profile_registry();
    let record = full_record();

    let entries = encode_entries(&registry, id, &record).unwrap();
    let decoded = decode_record(
        &registry,
        id,
        &mut EntrySource::from_entries(entries),
        &Selection::All,
    )
    .unwrap();

    assert_eq!(decoded, record);
}

#[test]
fn complex_typed_payloads_rebuild_from_child_qualifiers() {
    let (registry, id) = profile_registry();

    let mut record = Record::new();
    record.insert(0, Value::Uint(4));
    record.insert(
        6,
        Value::Typed {
            variant: 2,
            value: Box::new(Value::List(vec![
                Value::from("quarterly"),
                Value::from("forecast"),
            ])),
        },
    );

    let entries = encode_entries(&registry, id, &record).unwrap();
    let decoded = decode_record(
        &registry,
        id,
        &mut EntrySource::from_entries(entries),
        &Selection::All,
    )
    .unwrap();

    assert_eq!(decoded, record);
}

#[test]
fn soft_delete_markers_round_trip_at_both_levels() {
    let (registry, id) = profile_registry();

    let mut record = full_record();
    record.set_soft_deleted(true);
    let Some(Value::Embed(home)) = record.get_mut(5) else {
        panic!("fixture lost its embed");
    };
    home.set_soft_deleted(true);

    let entries = encode_entries(&registry, id, &record).unwrap();
    let decoded = decode_record(
        &registry,
        id,
        &mut EntrySource::from_entries(entries),
        &Selection::All,
    )
    .unwrap();

    let Some(Value::Embed(home)) = decoded.get(5) else {
        panic!("embedded record is missing");
    };
    assert!(home.soft_deleted());
    assert_eq!(decoded, record);
}

#[test]
fn emission_follows_qualifier_byte_order() {
    let (registry, id) = profile_registry();
    let entries = encode_entries(&registry, id, &full_record()).unwrap();

    // one cell per scalar and marker, size plus items per container
    assert_eq!(entries.len(), 15);

    for pair in entries.windows(2) {
        assert!(
            pair[0].qualifier < pair[1].qualifier,
            "{:?} then {:?} regressed the order",
            pair[0].qualifier.as_bytes(),
            pair[1].qualifier.as_bytes()
        );
    }
}

#[test]
fn map_items_sort_by_prefixed_key_bytes_not_canonical_order() {
    let (registry, id) = profile_registry();
    let entries = encode_entries(&registry, id, &full_record()).unwrap();

    // "wins" carries the shorter length prefix, so its cell is emitted first
    // even though "draws" precedes it in the normalized map
    let prefix = root_qualifier(2, RefTag::Map);
    let item_values: Vec<_> = entries
        .iter()
        .filter(|e| e.qualifier.starts_with(&prefix) && e.qualifier.len() > prefix.len())
        .map(|e| &e.value)
        .collect();

    assert_eq!(
        item_values,
        [
            &CellValue::Scalar(Value::Int(3)),
            &CellValue::Scalar(Value::Int(1)),
        ]
    );
}

#[test]
fn selections_prune_fields_and_narrow_embeds() {
    let (registry, id) = profile_registry();
    let record = full_record();
    let entries = encode_entries(&registry, id, &record).unwrap();

    let narrowed = decode_record(
        &registry,
        id,
        &mut EntrySource::from_entries(entries.clone()),
        &Selection::of([1, 3]),
    )
    .unwrap();

    assert_eq!(narrowed.len(), 2);
    assert_eq!(narrowed.get(1), record.get(1));
    assert_eq!(narrowed.get(3), record.get(3));

    let nested = decode_record(
        &registry,
        id,
        &mut EntrySource::from_entries(entries),
        &Selection::fields([(5, Selection::of([1]))]),
    )
    .unwrap();

    assert_eq!(nested.len(), 1);
    let Some(Value::Embed(home)) = nested.get(5) else {
        panic!("embedded record is missing");
    };
    assert_eq!(home.len(), 1);
    assert!(home.get(0).is_none());
    assert_eq!(home.get(1), Some(&Value::from("bakerstreet")));
}

#[test]
fn stored_nulls_drop_the_cell_and_its_subtree() {
    let (registry, id) = profile_registry();

    // a nulled scalar leaves no field behind
    let cells = vec![(
        Qualifier::new(root_qualifier(1, RefTag::Value)),
        StorageKind::Value,
        None,
    )];
    let decoded = decode_record(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
    )
    .unwrap();
    assert!(decoded.is_empty());

    // a nulled container size shadows the items still stored under it
    let size_q = root_qualifier(2, RefTag::Map);
    let mut item_q = size_q.clone();
    push_length_prefix(&mut item_q, 1);
    item_q.push(b'a');

    let cells = vec![
        (Qualifier::new(size_q), StorageKind::MapSize, None),
        (
            Qualifier::new(item_q),
            StorageKind::Value,
            Some(CellValue::Scalar(Value::Int(1))),
        ),
    ];
    let decoded = decode_record(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
    )
    .unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn qualifier_streams_must_strictly_ascend() {
    let (registry, id) = profile_registry();

    let cells = vec![
        (
            Qualifier::new(root_qualifier(1, RefTag::Value)),
            StorageKind::Value,
            Some(CellValue::Scalar(Value::from("ada"))),
        ),
        (
            Qualifier::new(root_qualifier(1, RefTag::Value)),
            StorageKind::Value,
            Some(CellValue::Scalar(Value::from("bea"))),
        ),
    ];

    let err = decode_record(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
    )
    .unwrap_err();

    assert!(err.to_string().contains("strictly ascending"));
}

#[test]
fn qualifiers_past_a_scalar_leaf_are_malformed() {
    let (registry, id) = profile_registry();

    let mut overlong = root_qualifier(1, RefTag::Value);
    overlong.push(0xFF);

    let cells = vec![(
        Qualifier::new(overlong),
        StorageKind::Value,
        Some(CellValue::Scalar(Value::from("ada"))),
    )];

    let err = decode_record(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
    )
    .unwrap_err();

    assert!(err.to_string().contains("past a scalar leaf"));
}

#[test]
fn unknown_special_marker_bytes_are_malformed() {
    let (registry, id) = profile_registry();

    let mut marker = root_qualifier(0, RefTag::Special);
    marker.push(9);

    let cells = vec![(
        Qualifier::new(marker),
        StorageKind::ObjectDelete,
        Some(CellValue::Scalar(Value::Bool(true))),
    )];

    let err = decode_record(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
    )
    .unwrap_err();

    assert!(err.to_string().contains("unknown special marker byte 9"));
}

#[test]
fn reads_check_the_stored_cell_kind() {
    let (registry, id) = profile_registry();

    // a text field stored under a list-size kind fails the source contract
    let cells = vec![(
        Qualifier::new(root_qualifier(1, RefTag::Value)),
        StorageKind::ListSize,
        Some(CellValue::Count(1)),
    )];

    let err = decode_record(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
    )
    .unwrap_err();

    assert!(err.to_string().contains("stored as list_size, read as value"));
}
