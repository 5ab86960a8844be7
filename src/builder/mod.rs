//! # Incremental Index Builder
//!
//! The background routine that advances the build cursor of every live
//! index on a table by scanning newly appended tile groups, forming
//! index keys, and inserting them — while concurrent writers keep
//! appending new tile groups and queries keep scanning through
//! [`crate::scan::hybrid_scan`].
//!
//! The builder takes no table-wide lock. Between tile groups it yields
//! nothing beyond returning control to the caller, which is exactly the
//! granularity [`build_index`] processes at, so a cancellation check
//! between tile groups is cheap.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::index::{Index, IndexError};
use crate::registry::IndexRegistry;
use crate::tile::{Table, TupleId, Value};


/// Per-pass knobs for the builder.
#[derive(Debug, Clone, Copy)]
pub struct BuildConfig {
    /// Max tile groups processed per index per pass (`max_tile_groups_indexed_per_pass`).
    pub max_tile_groups_per_pass: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_tile_groups_per_pass: 10,
        }
    }
}

/// A single index's build step failed. Recoverable: the caller marks
/// the index retired and continues with the others.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("duplicate key in unique index {oid}")]
    DuplicateKey { oid: u64 },
}

impl From<IndexError> for BuilderError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::DuplicateKey { oid } => BuilderError::DuplicateKey { oid },
        }
    }
}

/// Advances `index`'s build cursor by inserting rows from up to
/// `cfg.max_tile_groups_per_pass` newly-available tile groups.
///
/// Returns the number of tile groups fully processed. Every row in a
/// tile group is indexed regardless of MVCC visibility — visibility is
/// applied at read time by the hybrid scan, not at build time.
pub fn build_index(table: &Table, index: &Arc<dyn Index>, cfg: &BuildConfig) -> Result<u64, BuilderError> {
    let meta = index.metadata();
    let start = meta.build_cursor();
    let total = table.tile_group_count();

    let mut processed = 0u64;
    // A reusable key-tuple buffer, refilled per row rather than
    // allocated fresh each time.
    let mut key_buf: Vec<Value> = Vec::with_capacity(meta.key_attrs.len());

    let mut tile_group_id = start;
    while tile_group_id < total && processed < cfg.max_tile_groups_per_pass {
        let Some(tg) = table.tile_group(tile_group_id) else {
            break;
        };

        let active = tg.next_tuple_slot();
        for offset in 0..active {
            let Some(row) = tg.copy_tuple(offset) else {
                continue;
            };

            key_buf.clear();
            for &col in &meta.key_attrs {
                key_buf.push(row[col as usize].clone());
            }

            let location = TupleId { block: tg.id, offset };
            index.insert(key_buf.clone(), location)?;
        }

        trace!(tile_group = tg.id, rows = active, oid = meta.oid, "indexed tile group");
        tile_group_id += 1;
        processed += 1;
    }

    if processed > 0 {
        meta.advance_build_cursor(processed);
    }

    Ok(processed)
}

/// Report of one builder pass over a table's registry.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// (oid, tile groups processed) for every index that made progress.
    pub advanced: Vec<(u64, u64)>,
    /// oids retired this pass due to a recoverable build failure.
    pub retired: Vec<u64>,
}

/// Runs [`build_index`] for every live index on `table`, retiring any
/// index whose build step fails instead of aborting the whole pass.
pub fn build_all(table: &Table, registry: &IndexRegistry, cfg: &BuildConfig) -> BuildReport {
    let mut report = BuildReport::default();

    for (_, index) in registry.iter_live() {
        let oid = index.metadata().oid;
        match build_index(table, &index, cfg) {
            Ok(0) => {}
            Ok(n) => report.advanced.push((oid, n)),
            Err(e) => {
                warn!(oid, error = %e, "build step failed, retiring index");
                if registry.drop_by_oid(oid).is_ok() {
                    report.retired.push(oid);
                }
            }
        }
    }

    report
}
