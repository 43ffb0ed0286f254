use super::{full_record, profile_registry, root_qualifier};
use crate::{
    obs::{CodecEvent, MetricsSink, sink::with_metrics_sink},
    qualifier::{
        CellValue, EntrySource, Qualifier, RefTag, Selection, StorageKind,
        decode::decode_record_cached, decode_record, encode_entries,
    },
    value::{Value, push_length_prefix},
};
use std::cell::Cell;

///
/// RouteSink
/// counts routing and eviction events for one decode pass
///

#[derive(Default)]
struct RouteSink {
    hits: Cell<u64>,
    misses: Cell<u64>,
    evictions: Cell<u64>,
    evicted_routes: Cell<u64>,
}

impl MetricsSink for RouteSink {
    fn record(&self, event: CodecEvent) {
        match event {
            CodecEvent::QualifierRouted { cache_hit: true } => {
                self.hits.set(self.hits.get() + 1);
            }
            CodecEvent::QualifierRouted { cache_hit: false } => {
                self.misses.set(self.misses.get() + 1);
            }
            CodecEvent::CacheEvicted { count } => {
                self.evictions.set(self.evictions.get() + 1);
                self.evicted_routes.set(self.evicted_routes.get() + count);
            }
            _ => {}
        }
    }
}

#[test]
fn cached_and_uncached_walks_produce_identical_records() {
    let (registry, id) = profile_registry();
    let record = full_record();
    let entries = encode_entries(&registry, id, &record).unwrap();

    let cached = decode_record(
        &registry,
        id,
        &mut EntrySource::from_entries(entries.clone()),
        &Selection::All,
    )
    .unwrap();
    let uncached = decode_record_cached(
        &registry,
        id,
        &mut EntrySource::from_entries(entries),
        &Selection::All,
        false,
    )
    .unwrap();

    assert_eq!(cached, record);
    assert_eq!(uncached, record);
}

#[test]
fn shared_prefixes_ride_installed_routes() {
    let (registry, id) = profile_registry();
    let record = full_record();
    let entries = encode_entries(&registry, id, &record).unwrap();

    let sink = RouteSink::default();
    let decoded = with_metrics_sink(&sink, || {
        decode_record(
            &registry,
            id,
            &mut EntrySource::from_entries(entries),
            &Selection::All,
        )
    })
    .unwrap();

    assert_eq!(decoded, record);

    // seven cold dispatches, one per root cell; eight hits, one per container
    // item or embedded child; crossing into each later subtree pops exactly
    // the one stale route behind it
    assert_eq!(sink.misses.get(), 7);
    assert_eq!(sink.hits.get(), 8);
    assert_eq!(sink.evictions.get(), 4);
    assert_eq!(sink.evicted_routes.get(), 4);
}

#[test]
fn disabling_the_cache_walks_every_qualifier_from_the_root() {
    let (registry, id) = profile_registry();
    let record = full_record();
    let entries = encode_entries(&registry, id, &record).unwrap();

    let sink = RouteSink::default();
    let decoded = with_metrics_sink(&sink, || {
        decode_record_cached(
            &registry,
            id,
            &mut EntrySource::from_entries(entries),
            &Selection::All,
            false,
        )
    })
    .unwrap();

    assert_eq!(decoded, record);
    assert_eq!(sink.misses.get(), 15);
    assert_eq!(sink.hits.get(), 0);
    assert_eq!(sink.evictions.get(), 0);
}

#[test]
fn deleted_subtrees_discard_even_with_the_cache_disabled() {
    let (registry, id) = profile_registry();

    let size_q = root_qualifier(2, RefTag::Map);
    let mut item_q = size_q.clone();
    push_length_prefix(&mut item_q, 1);
    item_q.push(b'a');

    let cells = vec![
        (
            Qualifier::new(root_qualifier(1, RefTag::Value)),
            StorageKind::Value,
            Some(CellValue::Scalar(Value::from("ada"))),
        ),
        (Qualifier::new(size_q), StorageKind::MapSize, None),
        (
            Qualifier::new(item_q),
            StorageKind::Value,
            Some(CellValue::Scalar(Value::Int(1))),
        ),
    ];

    let decoded = decode_record_cached(
        &registry,
        id,
        &mut EntrySource::from_cells(cells),
        &Selection::All,
        false,
    )
    .unwrap();

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded.get(1), Some(&Value::from("ada")));
}
