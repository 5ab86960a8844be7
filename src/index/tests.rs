use super::*;
use crate::tile::Value;

fn meta(kind: IndexKind) -> IndexMetadata {
    IndexMetadata::new(1, "idx", vec![2, 1], kind)
}

#[test]
fn key_attrs_are_canonicalized_by_position() {
    let m = meta(IndexKind::Secondary);
    assert_eq!(m.key_attrs, vec![1, 2]);
}

#[test]
fn insert_and_scan_roundtrip() {
    let idx = SkipListIndex::new(meta(IndexKind::Secondary));
    let key = vec![Value::Int(42)];
    idx.insert(key.clone(), TupleId { block: 0, offset: 0 }).unwrap();
    idx.insert(key.clone(), TupleId { block: 0, offset: 1 }).unwrap();
    idx.insert(vec![Value::Int(7)], TupleId { block: 1, offset: 0 })
        .unwrap();

    let mut hits = idx.scan(&key);
    hits.sort();
    assert_eq!(
        hits,
        vec![
            TupleId { block: 0, offset: 0 },
            TupleId { block: 0, offset: 1 },
        ]
    );
    assert_eq!(idx.scan_all().len(), 3);
}

#[test]
fn duplicate_insert_of_same_entry_is_a_no_op() {
    let idx = SkipListIndex::new(meta(IndexKind::Secondary));
    let key = vec![Value::Int(1)];
    let loc = TupleId { block: 0, offset: 0 };
    idx.insert(key.clone(), loc).unwrap();
    idx.insert(key.clone(), loc).unwrap();
    assert_eq!(idx.scan(&key).len(), 1);
}

#[test]
fn unique_index_rejects_second_distinct_location_for_same_key() {
    let idx = SkipListIndex::new(meta(IndexKind::UniqueSecondary));
    let key = vec![Value::Int(1)];
    idx.insert(key.clone(), TupleId { block: 0, offset: 0 })
        .unwrap();
    let err = idx.insert(key.clone(), TupleId { block: 0, offset: 1 });
    assert!(err.is_err());
}

#[test]
fn build_cursor_advances_monotonically() {
    let m = meta(IndexKind::Secondary);
    assert_eq!(m.build_cursor(), 0);
    m.advance_build_cursor(3);
    assert_eq!(m.build_cursor(), 3);
    m.advance_build_cursor(2);
    assert_eq!(m.build_cursor(), 5);
}

#[test]
fn utility_defaults_to_one_half() {
    let m = meta(IndexKind::Secondary);
    assert_eq!(m.utility(), 0.5);
    m.set_utility(0.1);
    assert_eq!(m.utility(), 0.1);
}
