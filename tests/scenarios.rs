//! End-to-end scenarios for the adaptive index tuner, driven entirely
//! through the public `tiletuner` API.
//!
//! Each test corresponds to one of the six workload scenarios the
//! tuner subsystem is expected to handle correctly: suggest-and-build,
//! hybrid-scan correctness mid-build, drop-on-write-pressure, utility
//! decay, storage-cap enforcement, and a clean stop/join.
//!
//! ## See also
//! - [`tiletuner::tuner::tests`] — unit-level EMA/policy tests
//! - [`tiletuner::scan::tests`] — unit-level hybrid scan tests

use std::sync::Arc;

use tiletuner::index::IndexKind;
use tiletuner::sample::Sample;
use tiletuner::scan::{hybrid_scan, IndexDescriptor, PredicateFn};
use tiletuner::tile::{Table, TupleId, Value};
use tiletuner::tuner::{Tuner, TunerConfig};
use tiletuner::txn::SimpleTransactionManager;

/// Appends exactly `tile_groups` tile groups with `rows_per_group` rows
/// each, three columns wide, writing `col2` as a constant so predicates
/// over it are easy to construct.
fn seed(table: &Table, tile_groups: u64, rows_per_group: u64, col2: i64) {
    let txn = SimpleTransactionManager::new();
    for _ in 0..tile_groups {
        let tg = table.append_tile_group();
        for r in 0..rows_per_group {
            let cid = txn.next_commit_id();
            tg.insert(vec![Value::Int(r as i64), Value::Int(col2), Value::Int(0)], cid);
        }
    }
}

fn eq_predicate(col: usize, value: i64) -> PredicateFn {
    Arc::new(move |row: &[Value]| row.get(col).and_then(Value::as_int) == Some(value))
}

/// S1 — Suggest and build. One pass over 40 access samples on column 2
/// creates exactly one index with key {2}, default utility, and cursor
/// 0; ten passes of the builder, capped at 10 tile groups each, walk
/// the cursor from 0 to 100.
#[test]
fn s1_suggest_and_build() {
    let table = Table::new("orders", 3);
    seed(&table, 100, 4, 7);

    for _ in 0..40 {
        table.samples.record(Sample::access(vec![2], 1.0));
    }

    let tuner = Tuner::new(TunerConfig {
        sample_count_threshold: 20,
        max_tile_groups_indexed_per_pass: 10,
        ..Default::default()
    });

    tuner.analyze_table(&table).unwrap();

    let live = table.registry.iter_live();
    assert_eq!(live.len(), 1, "exactly one index should be suggested");
    let (_, index) = &live[0];
    assert_eq!(index.metadata().key_attrs, vec![2]);
    assert_eq!(index.metadata().kind, IndexKind::Secondary);
    assert_eq!(index.metadata().utility(), 0.5);
    // The builder already ran once as part of analyze_table's step (g),
    // so the cursor has advanced by one pass worth of tile groups.
    assert_eq!(index.metadata().build_cursor(), 10);

    for _ in 0..9 {
        for _ in 0..40 {
            table.samples.record(Sample::access(vec![2], 1.0));
        }
        tuner.analyze_table(&table).unwrap();
    }

    let live = table.registry.iter_live();
    assert_eq!(live[0].1.metadata().build_cursor(), 100);
}

/// S2 — Hybrid correctness during build. With the index frozen at
/// cursor 30 out of 100 tile groups, a predicate scan through the
/// index must match a full sequential scan exactly, with no
/// duplicates and no missed rows.
#[test]
fn s2_hybrid_correctness_during_build() {
    let table = Table::new("orders", 3);
    seed(&table, 100, 4, 7);

    let meta = tiletuner::index::IndexMetadata::new(1, "idx_col2", vec![2], IndexKind::Secondary);
    let index = tiletuner::index::SkipListIndex::new(meta);
    for tg in table.tile_groups_snapshot().into_iter().take(30) {
        for offset in 0..tg.next_tuple_slot() {
            let row = tg.copy_tuple(offset).unwrap();
            index
                .insert(vec![row[2].clone()], TupleId { block: tg.id, offset })
                .unwrap();
        }
    }
    index.metadata().advance_build_cursor(30);

    let txn = SimpleTransactionManager::new();
    let snap = txn.snapshot();
    let pred = eq_predicate(2, 7);
    let descriptor = IndexDescriptor {
        index: index.clone(),
        key: vec![Value::Int(7)],
    };

    let via_index = hybrid_scan(&table, &pred, Some(&descriptor), &txn, &snap).unwrap();
    let via_sequential = hybrid_scan(&table, &pred, None, &txn, &snap).unwrap();

    let mut a: Vec<_> = via_index.iter().map(|(id, _)| *id).collect();
    let mut b: Vec<_> = via_sequential.iter().map(|(id, _)| *id).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(a.len(), 400, "every one of 100 * 4 rows matches column 2 = 7");

    let mut dedup = a.clone();
    dedup.dedup();
    assert_eq!(dedup.len(), a.len(), "no duplicate rows across the hybrid scan");
}

/// S3 — Drop on write pressure. A write-heavy workload smooths the
/// write ratio above the threshold; once a later pass also falls below
/// the utility floor, the index on {3} must not survive, and no new
/// index should appear while the ratio stays write-heavy.
#[test]
fn s3_drop_on_write_pressure() {
    let table = Table::new("orders", 4);
    seed(&table, 5, 4, 0);

    let meta = tiletuner::index::IndexMetadata::new(1, "idx_col3", vec![3], IndexKind::Secondary);
    meta.set_utility(0.05);
    table.registry.add(tiletuner::index::SkipListIndex::new(meta));

    for _ in 0..200 {
        table.samples.record(Sample::access(vec![3], 1.0));
    }
    for _ in 0..1000 {
        table.samples.record(Sample::update(1.0));
    }

    let tuner = Tuner::new(TunerConfig {
        sample_count_threshold: 20,
        write_ratio_threshold: 0.8,
        index_utility_threshold: 0.1,
        ..Default::default()
    });
    tuner.analyze_table(&table).unwrap();

    let ratio = tuner.smoothed_write_ratio().unwrap();
    assert!(ratio > 0.8, "write-heavy workload must push the ratio above threshold, got {ratio}");
    assert!(
        table.registry.iter_live().is_empty(),
        "the below-threshold index on column 3 must be dropped"
    );

    // While the workload stays write-heavy, no new index should reappear.
    for _ in 0..1000 {
        table.samples.record(Sample::update(1.0));
    }
    tuner.analyze_table(&table).unwrap();
    assert!(table.registry.iter_live().is_empty());
}

/// S4 — Utility decay. An index on {4} starts at 0.5 utility; five
/// consecutive passes of samples that never touch column 4 decay it
/// monotonically until it drops below threshold and is removed.
#[test]
fn s4_utility_decay() {
    let table = Table::new("orders", 5);
    seed(&table, 3, 4, 0);

    let meta = tiletuner::index::IndexMetadata::new(1, "idx_col4", vec![4], IndexKind::Secondary);
    assert_eq!(meta.utility(), 0.5);
    table.registry.add(tiletuner::index::SkipListIndex::new(meta));

    let tuner = Tuner::new(TunerConfig {
        sample_count_threshold: 20,
        index_utility_threshold: 0.1,
        alpha: 0.2,
        ..Default::default()
    });

    let mut last_utility = 0.5;
    let mut dropped_after = None;
    for pass in 1..=5 {
        for _ in 0..25 {
            table.samples.record(Sample::access(vec![0], 1.0));
        }
        tuner.analyze_table(&table).unwrap();

        let live = table.registry.iter_live();
        if live.is_empty() {
            dropped_after = Some(pass);
            break;
        }
        let u = live[0].1.metadata().utility();
        assert!(u < last_utility, "utility must decay monotonically, pass {pass}: {u} vs {last_utility}");
        last_utility = u;
    }

    assert!(
        dropped_after.is_some(),
        "utility should decay below threshold within five passes, last seen {last_utility}"
    );
}

/// S5 — Cap enforcement. Six distinct column sets compete for five
/// index slots; after one pass at most five indexes exist, and the
/// column set with the smallest histogram fraction is the one left out.
#[test]
fn s5_cap_enforcement() {
    let table = Table::new("orders", 7);
    seed(&table, 2, 4, 0);

    // Column 6 gets the fewest samples, so it should lose the cap fight.
    let weights = [(0u32, 50), (1, 45), (2, 40), (3, 35), (4, 30), (6, 5)];
    for &(col, n) in &weights {
        for _ in 0..n {
            table.samples.record(Sample::access(vec![col], 1.0));
        }
    }

    let tuner = Tuner::new(TunerConfig {
        sample_count_threshold: 20,
        index_count_threshold: 5,
        frequent_sample_rank: 10,
        ..Default::default()
    });
    tuner.analyze_table(&table).unwrap();

    let live = table.registry.iter_live();
    assert!(live.len() <= 5, "storage cap must never be exceeded");
    assert!(
        live.iter().all(|(_, idx)| idx.metadata().key_attrs != vec![6]),
        "the least-sampled column set must be excluded from the top five"
    );
}

/// S6 — Stop-join. After `stop()` returns, the background worker has
/// been joined and no further index mutation is in flight.
#[test]
fn s6_stop_join() {
    let table = Arc::new(Table::new("orders", 2));
    seed(&table, 2, 4, 0);
    for _ in 0..40 {
        table.samples.record(Sample::access(vec![0], 1.0));
    }

    let tuner = Tuner::new(TunerConfig {
        sample_count_threshold: 20,
        ..Default::default()
    });
    tuner.register_table(table.clone());
    tuner.start();
    std::thread::sleep(std::time::Duration::from_millis(50));
    tuner.stop();

    let cursor_after_stop = table
        .registry
        .iter_live()
        .first()
        .map(|(_, idx)| idx.metadata().build_cursor());

    std::thread::sleep(std::time::Duration::from_millis(50));

    let cursor_later = table
        .registry
        .iter_live()
        .first()
        .map(|(_, idx)| idx.metadata().build_cursor());

    assert_eq!(cursor_after_stop, cursor_later, "no mutation may happen once stop() has returned");
}
