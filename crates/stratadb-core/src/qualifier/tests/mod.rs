mod cache;
mod roundtrip;

use crate::{
    model::{FieldKind, FieldModel, RecordSchema, SchemaId, SchemaRegistry, TypeVariant},
    qualifier::{RefTag, segment::push_segment},
    value::{Record, Value},
};

/// Qualifier bytes addressing a root field.
fn root_qualifier(property: u32, tag: RefTag) -> Vec<u8> {
    let mut out = Vec::new();
    push_segment(&mut out, property, tag);
    out
}

/// Registry exercising every field shape the passes know: scalars, the three
/// containers, an embedded record, and a typed field with unit, inline scalar
/// and structured payload variants.
fn profile_registry() -> (SchemaRegistry, SchemaId) {
    let mut builder = SchemaRegistry::builder();

    let address = builder.push(
        RecordSchema::new(
            "address",
            vec![
                FieldModel::new(0, "nr", FieldKind::Uint),
                FieldModel::new(1, "city", FieldKind::Text),
            ],
            &[0],
        )
        .unwrap(),
    );

    let profile = builder.push(
        RecordSchema::new(
            "profile",
            vec![
                FieldModel::new(0, "id", FieldKind::Uint),
                FieldModel::new(1, "name", FieldKind::Text),
                FieldModel::new(2, "scores", FieldKind::map(FieldKind::Text, FieldKind::Int)),
                FieldModel::new(3, "tags", FieldKind::set(FieldKind::Uint)),
                FieldModel::new(4, "aliases", FieldKind::list(FieldKind::Text)),
                FieldModel::new(5, "home", FieldKind::Embed(address)),
                FieldModel::new(
                    6,
                    "status",
                    FieldKind::Typed(vec![
                        TypeVariant::new(0, "offline", None),
                        TypeVariant::new(1, "away_for", Some(FieldKind::Int)),
                        TypeVariant::new(2, "busy_with", Some(FieldKind::list(FieldKind::Text))),
                    ]),
                ),
            ],
            &[0],
        )
        .unwrap(),
    );

    (builder.finish().unwrap(), profile)
}

/// A profile populating all seven fields. The map's qualifier byte order
/// ("wins" has the shorter length prefix) differs from its canonical entry
/// order, so round trips also prove decode-side re-normalization.
fn full_record() -> Record {
    let mut home = Record::new();
    home.insert(0, Value::Uint(221));
    home.insert(1, Value::from("bakerstreet"));

    let mut record = Record::new();
    record.insert(0, Value::Uint(1));
    record.insert(1, Value::from("ada"));
    record.insert(
        2,
        Value::from_map(vec![
            (Value::from("wins"), Value::Int(3)),
            (Value::from("draws"), Value::Int(1)),
        ])
        .unwrap(),
    );
    record.insert(3, Value::from_set(vec![Value::Uint(7), Value::Uint(2)]));
    record.insert(
        4,
        Value::List(vec![Value::from("countess"), Value::from("aal")]),
    );
    record.insert(5, Value::Embed(home));
    record.insert(
        6,
        Value::Typed {
            variant: 1,
            value: Box::new(Value::Int(45)),
        },
    );

    record
}
