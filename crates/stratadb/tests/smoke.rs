//! End-to-end pass over the public surface: declare a schema, encode a
//! record, decode it back, and plan a filtered scan.

use stratadb::prelude::*;

fn inventory_registry() -> (SchemaRegistry, SchemaId) {
    let mut builder = SchemaRegistry::builder();

    let item = builder.push(
        RecordSchema::new(
            "item",
            vec![
                FieldModel::new(0, "warehouse", FieldKind::Uint),
                FieldModel::new(1, "slot", FieldKind::Int32),
                FieldModel::new(2, "label", FieldKind::Text),
                FieldModel::new(3, "quantity", FieldKind::Int),
            ],
            &[0, 1],
        )
        .unwrap()
        .with_index("by_label", &[2], false)
        .unwrap(),
    );

    (builder.finish().unwrap(), item)
}

#[test]
fn records_round_trip_through_the_facade() {
    let (registry, id) = inventory_registry();

    let mut record = Record::new();
    record.insert(0, Value::Uint(7));
    record.insert(1, Value::Int32(40));
    record.insert(2, Value::from("bolts"));
    record.insert(3, Value::Int(250));

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
fn filters_fold_into_key_scan_envelopes() {
    let (registry, id) = inventory_registry();
    let schema = registry.schema(id).unwrap();

    let filter = FilterExpr::eq("warehouse", 7u64) & FilterExpr::gte("slot", 10);
    let plan = plan_key_scan(schema, &filter, None, true);

    let inside = schema
        .key()
        .encode_key(&[Value::Uint(7), Value::Int32(25)])
        .unwrap();
    assert!(!plan.key_before_start(&inside));
    assert!(!plan.key_out_of_range(&inside));

    let below = schema
        .key()
        .encode_key(&[Value::Uint(7), Value::Int32(3)])
        .unwrap();
    assert!(plan.key_before_start(&below));
}
