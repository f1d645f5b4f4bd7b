//! End-to-end behaviour of the attribute stores against an in-memory drawing.

use attrstore::{
    document, mark_component, registry, EntityAttributeStore, Part, PartList, Reconciler,
    StoreError, WorkPoint, COMPONENT_MARKER, PARTS_NAMESPACE, WORK_POINT_KEY,
};
use chunkcodec::{chunk_namespace, ChunkCodec};
use slotstore::{Drawing, EntityId, Host, HostError, Owner, SlotStore, Value};

const BASE: &str = PARTS_NAMESPACE;

fn store(size: usize, ceiling: usize) -> EntityAttributeStore {
    EntityAttributeStore::new(ChunkCodec::new(size, ceiling).unwrap())
}

fn slot(dwg: &mut Drawing, e: EntityId, ns: &str) -> Option<Vec<Value>> {
    dwg.transaction(|tx| tx.get_slot(Owner::Entity(e), ns))
        .unwrap()
}

fn text_record(chars: usize) -> String {
    // {"pad":"xxx..."} with exactly `chars` characters
    format!(r#"{{"pad":"{}"}}"#, "x".repeat(chars - 10))
}

/// Wraps a drawing and fails the commit of one chosen unit of work.
struct FlakyHost {
    inner: Drawing,
    opened: usize,
    fail_at: usize,
}

impl Host for FlakyHost {
    fn transaction<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        E: From<HostError>,
        F: FnOnce(&mut dyn SlotStore) -> Result<T, E>,
    {
        self.opened += 1;
        if self.opened == self.fail_at {
            self.inner.fail_next_commits(1);
        }
        self.inner.transaction(work)
    }
}

// -------------------- Entity store --------------------

#[test]
fn single_chunk_write_reads_back_identical_text() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = EntityAttributeStore::default();
    let text = r#"{"parts":[{"id":"A1","len":30.0}]}"#;

    let out = dwg
        .transaction(|tx| s.write_text(tx, e, BASE, text))
        .unwrap();
    assert_eq!(out.chunk_count, 1);
    assert_eq!(slot(&mut dwg, e, "METALPARTSINFO"), Some(vec![Value::Int(1)]));
    assert_eq!(
        slot(&mut dwg, e, "METALPARTS0"),
        Some(vec![Value::Text(text.to_string())])
    );

    let back = dwg.transaction(|tx| s.read_text(tx, e, BASE)).unwrap();
    assert_eq!(back.as_deref(), Some(text));
}

#[test]
fn shrinking_from_three_chunks_to_one_clears_the_rest() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = store(1000, 20);

    let long = text_record(2500);
    let out = dwg
        .transaction(|tx| s.write_text(tx, e, BASE, &long))
        .unwrap();
    assert_eq!(out.chunk_count, 3);

    let short = text_record(800);
    let out = dwg
        .transaction(|tx| s.write_text(tx, e, BASE, &short))
        .unwrap();
    assert_eq!(out.chunk_count, 1);
    assert_eq!(out.reclaimed, vec![1, 2]);

    assert_eq!(slot(&mut dwg, e, "METALPARTSINFO"), Some(vec![Value::Int(1)]));
    assert_eq!(slot(&mut dwg, e, "METALPARTS1"), None);
    assert_eq!(slot(&mut dwg, e, "METALPARTS2"), None);
    let back = dwg.transaction(|tx| s.read_text(tx, e, BASE)).unwrap();
    assert_eq!(back, Some(short));
}

#[test]
fn orphans_from_any_earlier_write_are_reclaimed() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = store(100, 20);

    for (k, m) in [(1, 4), (2, 7), (5, 1)] {
        dwg.transaction(|tx| s.write_text(tx, e, BASE, &text_record((k + m) * 100)))
            .unwrap();
        let out = dwg
            .transaction(|tx| s.write_text(tx, e, BASE, &text_record(k * 100)))
            .unwrap();
        assert_eq!(out.chunk_count, k);
        for j in k..20 {
            assert_eq!(slot(&mut dwg, e, &chunk_namespace(BASE, j)), None);
        }
    }
}

#[test]
fn identical_rewrite_is_idempotent() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = store(64, 20);
    let parts = PartList {
        parts: (0..12).map(|i| Part::new(format!("T{i}"), 96.0)).collect(),
    };

    s.save(&mut dwg, e, BASE, &parts).unwrap();
    let snapshot = dwg.clone();
    s.save(&mut dwg, e, BASE, &parts).unwrap();

    let before: Vec<_> = snapshot.slots().map(|(o, n, v)| (o, n.to_string(), v.clone())).collect();
    let after: Vec<_> = dwg.slots().map(|(o, n, v)| (o, n.to_string(), v.clone())).collect();
    assert_eq!(before, after);
}

#[test]
fn record_over_the_ceiling_is_refused() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = store(1000, 20);

    // 20 chunks is the most that fits
    dwg.transaction(|tx| s.write_text(tx, e, BASE, &text_record(20_000)))
        .unwrap();

    let err = dwg
        .transaction(|tx| s.write_text(tx, e, BASE, &text_record(20_001)))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::ChunkCeilingExceeded {
            needed: 21,
            ceiling: 20,
            ..
        }
    ));
    let count = dwg.transaction(|tx| s.chunk_count(tx, e, BASE)).unwrap();
    assert_eq!(count, Some(20));
}

#[test]
fn absent_and_empty_records_read_as_none() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = EntityAttributeStore::default();

    assert_eq!(s.load::<_, PartList>(&mut dwg, e, BASE).unwrap(), None);

    s.save(&mut dwg, e, BASE, &PartList::default()).unwrap();
    dwg.transaction(|tx| s.clear(tx, e, BASE)).unwrap();
    assert_eq!(s.load::<_, PartList>(&mut dwg, e, BASE).unwrap(), None);
}

#[test]
fn write_on_erased_entity_fails() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = EntityAttributeStore::default();
    s.save(&mut dwg, e, BASE, &PartList::default()).unwrap();
    assert!(dwg.erase_entity(e));

    let err = s.save(&mut dwg, e, BASE, &PartList::default()).unwrap_err();
    assert!(matches!(err, StoreError::Host(HostError::NoSuchEntity(id)) if id == e));
}

// -------------------- Document store --------------------

#[test]
fn document_records_live_beside_entity_records() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let s = EntityAttributeStore::default();
    let wp = WorkPoint {
        x: 10.0,
        y: 20.0,
        z: 0.0,
    };

    document::save(&mut dwg, WORK_POINT_KEY, &wp).unwrap();
    s.save(&mut dwg, e, BASE, &PartList::default()).unwrap();

    assert_eq!(
        document::load::<_, WorkPoint>(&mut dwg, WORK_POINT_KEY).unwrap(),
        Some(wp)
    );
    // the work point key holds nothing on the entity
    assert_eq!(slot(&mut dwg, e, WORK_POINT_KEY), None);
}

// -------------------- Reconciliation --------------------

fn marked(dwg: &mut Drawing, s: &EntityAttributeStore, text: &str) -> EntityId {
    let e = dwg.add_entity();
    dwg.transaction(|tx| -> attrstore::Result<()> {
        mark_component(tx, e, "storefront")?;
        s.write_text(tx, e, BASE, text)?;
        Ok(())
    })
    .unwrap();
    e
}

#[test]
fn batch_of_five_with_one_broken_entity() {
    let mut dwg = Drawing::new();
    let s = store(500, 20);
    let texts: Vec<String> = [300, 900, 1200, 450, 700]
        .into_iter()
        .map(text_record)
        .collect();
    let ids: Vec<EntityId> = texts.iter().map(|t| marked(&mut dwg, &s, t)).collect();

    // ids[1] holds two chunks; drop the second one
    dwg.transaction(|tx| tx.set_slot(Owner::Entity(ids[1]), "METALPARTS1", Vec::new()))
        .unwrap();
    let broken_info = slot(&mut dwg, ids[1], "METALPARTSINFO");
    let broken_first = slot(&mut dwg, ids[1], "METALPARTS0");

    let report = Reconciler::new(ChunkCodec::new(200, 20).unwrap(), BASE, COMPONENT_MARKER)
        .run(&mut dwg)
        .unwrap();

    assert_eq!(report.reconciled, vec![ids[0], ids[2], ids[3], ids[4]]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].entity, ids[1]);

    let narrow = store(200, 20);
    for (i, e) in ids.iter().enumerate().filter(|(i, _)| *i != 1) {
        let back = dwg.transaction(|tx| narrow.read_text(tx, *e, BASE)).unwrap();
        assert_eq!(back.as_ref(), Some(&texts[i]));
        let count = dwg.transaction(|tx| narrow.chunk_count(tx, *e, BASE)).unwrap();
        assert_eq!(count, Some(texts[i].len().div_ceil(200)));
    }

    // the skipped entity is exactly as it was
    assert_eq!(slot(&mut dwg, ids[1], "METALPARTSINFO"), broken_info);
    assert_eq!(slot(&mut dwg, ids[1], "METALPARTS0"), broken_first);
}

#[test]
fn reconciling_twice_changes_nothing() {
    let mut dwg = Drawing::new();
    let s = store(1000, 20);
    marked(&mut dwg, &s, &text_record(1500));
    marked(&mut dwg, &s, &text_record(40));

    let pass = Reconciler::new(ChunkCodec::new(300, 20).unwrap(), BASE, COMPONENT_MARKER);
    pass.run(&mut dwg).unwrap();
    let once = dwg.clone();
    let report = pass.run(&mut dwg).unwrap();

    assert_eq!(report.registered, 0);
    let a: Vec<_> = once.slots().map(|(o, n, v)| (o, n.to_string(), v.clone())).collect();
    let b: Vec<_> = dwg.slots().map(|(o, n, v)| (o, n.to_string(), v.clone())).collect();
    assert_eq!(a, b);
}

#[test]
fn commit_failure_mid_pass_keeps_earlier_entities() {
    let mut dwg = Drawing::new();
    let s = store(1000, 20);
    let first = marked(&mut dwg, &s, &text_record(900));
    let second = marked(&mut dwg, &s, &text_record(900));

    // units of work: registration, listing, first entity, second entity
    let mut host = FlakyHost {
        inner: dwg,
        opened: 0,
        fail_at: 4,
    };
    let pass = Reconciler::new(ChunkCodec::new(100, 20).unwrap(), BASE, COMPONENT_MARKER);
    let err = pass.run(&mut host).unwrap_err();
    assert!(matches!(err, StoreError::HostTransactionFailure(_)));

    let mut dwg = host.inner;
    let narrow = store(100, 20);
    let count = |dwg: &mut Drawing, e| dwg.transaction(|tx| narrow.chunk_count(tx, e, BASE)).unwrap();
    assert_eq!(count(&mut dwg, first), Some(9));
    assert_eq!(count(&mut dwg, second), Some(1));
}

#[test]
fn preregistered_layout_lets_reads_and_writes_skip_registration() {
    let mut dwg = Drawing::new();
    let e = dwg.add_entity();
    let added = registry::preregister(&mut dwg, BASE, 20).unwrap();
    assert_eq!(added, 22);

    let s = store(1000, 20);
    s.save(&mut dwg, e, BASE, &PartList::default()).unwrap();
    assert_eq!(dwg.namespaces().count(), 22);
}
