//! # Hybrid Scan
//!
//! The query-side operator that, given a predicate and a (possibly
//! partially built) index, returns every matching visible row exactly
//! once — by stitching together an index probe over the indexed prefix
//! with a sequential scan over the unindexed suffix.
//!
//! ## Correctness
//!
//! The index's build cursor is read exactly once, at scan start, and
//! frozen for the lifetime of the scan. The builder may keep advancing
//! the *true* cursor concurrently — that is sound, because:
//!
//! - any tile group appended past the frozen cursor is covered by the
//!   sequential suffix scan,
//! - any tile group the builder indexes past the frozen cursor before
//!   this scan finishes is simply not consulted via the index, which
//!   only means this scan does slightly more sequential work, never
//!   less correctness.

use std::sync::Arc;

use tracing::trace;

use crate::index::{Index, IndexKind, Key};
use crate::tile::{Table, TupleId, Value};
use crate::txn::{Snapshot, TransactionManager};


/// A predicate over a materialized row.
pub type PredicateFn = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// Policy governing which index (if any) [`pick_index`] may hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickPolicy {
    /// Never use an index — force a pure sequential scan.
    Never,
    /// Any index whose key attribute set matches, regardless of build progress.
    Any,
    /// Only an index whose build cursor has already caught up to the
    /// full tile group count.
    FullOnly,
}

/// Picks a live index on `table` whose key attribute set equals
/// `columns`, subject to `policy`.
pub fn pick_index(
    table: &Table,
    columns: &std::collections::BTreeSet<u32>,
    policy: PickPolicy,
) -> Option<Arc<dyn Index>> {
    if policy == PickPolicy::Never {
        return None;
    }
    table.registry.iter_live().into_iter().find_map(|(_, idx)| {
        if &idx.metadata().key_attr_set() != columns {
            return None;
        }
        if policy == PickPolicy::FullOnly
            && idx.metadata().build_cursor() < table.tile_group_count()
        {
            return None;
        }
        Some(idx)
    })
}

/// The pre-folded index-scan descriptor the planner would otherwise
/// hand the hybrid scan: an index reference plus the equality key to
/// probe it with.
pub struct IndexDescriptor {
    pub index: Arc<dyn Index>,
    pub key: Key,
}

/// Errors a hybrid scan can raise. `ReadAborted` propagates to the
/// calling query only — the tuner is never affected by it.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("read must abort the transaction")]
    ReadAborted,
}

/// Runs a hybrid scan of `predicate` over `table`, visible to `txn`'s
/// snapshot, optionally accelerated by `descriptor`.
pub fn hybrid_scan(
    table: &Table,
    predicate: &PredicateFn,
    descriptor: Option<&IndexDescriptor>,
    txn: &dyn TransactionManager,
    snapshot: &Snapshot,
) -> Result<Vec<(TupleId, Vec<Value>)>, ScanError> {
    let Some(descriptor) = descriptor else {
        return sequential_scan(table, predicate, 0, txn, snapshot);
    };

    // Step 2: freeze the build cursor for the duration of this scan.
    let cursor = descriptor.index.metadata().build_cursor();
    trace!(cursor, "hybrid scan: frozen build cursor");

    let mut out = Vec::new();

    // Step 3: indexed prefix.
    for tuple_id in descriptor.index.scan(&descriptor.key) {
        if tuple_id.block >= cursor {
            // Belongs to the unindexed suffix; step 4 will see it.
            continue;
        }
        emit_if_visible(
            table,
            tuple_id,
            predicate,
            descriptor.index.metadata().kind,
            txn,
            snapshot,
            &mut out,
        )?;
    }

    // Step 4: sequential suffix, tile groups with block id >= cursor.
    out.extend(sequential_scan(table, predicate, cursor, txn, snapshot)?);

    Ok(out)
}

fn sequential_scan(
    table: &Table,
    predicate: &PredicateFn,
    from_block: u64,
    txn: &dyn TransactionManager,
    snapshot: &Snapshot,
) -> Result<Vec<(TupleId, Vec<Value>)>, ScanError> {
    let mut out = Vec::new();
    for tg in table.tile_groups_snapshot() {
        if tg.id < from_block {
            continue;
        }
        for offset in 0..tg.next_tuple_slot() {
            if !txn.is_visible(&tg.header, offset, snapshot) {
                continue;
            }
            let Some(row) = tg.copy_tuple(offset) else {
                continue;
            };
            if !predicate(&row) {
                continue;
            }
            let tuple_id = TupleId { block: tg.id, offset };
            if !txn.perform_read(tuple_id) {
                return Err(ScanError::ReadAborted);
            }
            out.push((tuple_id, row));
        }
    }
    Ok(out)
}

/// Applies visibility (with the primary-key MVCC chain walk) and the
/// predicate to a single candidate from the indexed prefix, pushing it
/// to `out` if both hold.
#[allow(clippy::too_many_arguments)]
fn emit_if_visible(
    table: &Table,
    mut tuple_id: TupleId,
    predicate: &PredicateFn,
    index_kind: IndexKind,
    txn: &dyn TransactionManager,
    snapshot: &Snapshot,
    out: &mut Vec<(TupleId, Vec<Value>)>,
) -> Result<(), ScanError> {
    let Some(mut tg) = table.tile_group(tuple_id.block) else {
        return Ok(());
    };

    loop {
        if txn.is_visible(&tg.header, tuple_id.offset, snapshot) {
            let Some(row) = tg.copy_tuple(tuple_id.offset) else {
                return Ok(());
            };
            if predicate(&row) {
                if !txn.perform_read(tuple_id) {
                    return Err(ScanError::ReadAborted);
                }
                out.push((tuple_id, row));
            }
            return Ok(());
        }

        // Step 5: only primary-key scans walk the MVCC chain.
        if index_kind != IndexKind::PrimaryKey {
            return Ok(());
        }

        let old_offset = tuple_id.offset;
        let old_end_cid = tg.header.end_cid(old_offset);
        let Some(next) = tg.header.next_item_pointer(old_offset) else {
            return Ok(());
        };

        // `<=` is the more aggressive cleanup comparison; losing the
        // CAS race below is benign.
        if old_end_cid <= txn.max_committed_cid() {
            let old_txn_id = tg.header.txn_id(old_offset);
            if tg.header.try_reset_txn_id(old_offset, old_txn_id) {
                let Some(next_tg) = table.tile_group(next.block) else {
                    return Ok(());
                };
                next_tg.header.set_prev_item_pointer_invalid(next.offset);
                tg = next_tg;
            } else {
                let Some(next_tg) = table.tile_group(next.block) else {
                    return Ok(());
                };
                tg = next_tg;
            }
        } else {
            let Some(next_tg) = table.tile_group(next.block) else {
                return Ok(());
            };
            tg = next_tg;
        }

        tuple_id = next;
    }
}
