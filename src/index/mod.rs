//! # Index
//!
//! Models the engine's polymorphic index hierarchy (primary-key,
//! unique-secondary, secondary) as a single [`Index`] trait object
//! carrying an [`IndexKind`] tag, rather than a class hierarchy per
//! index kind. A concurrent [`SkipListIndex`] implementation backs all
//! three kinds — built on `crossbeam_skiplist::SkipMap`, keyed on the
//! `(key, tuple identity)` pair itself so that duplicate inserts (a row
//! indexed twice, once by the builder and once by the normal
//! insert-path) are naturally deduplicated without any extra
//! bookkeeping.

use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_skiplist::SkipMap;

use crate::tile::{ColumnId, TupleId, Value};

#[cfg(test)]
mod tests;

/// An index key: the ordered tuple of values for the index's key columns.
pub type Key = Vec<Value>;

/// The role an index plays, selecting the MVCC chain-walk path in the
/// hybrid scan (only primary-key indexes walk the chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    PrimaryKey,
    Secondary,
    UniqueSecondary,
}

/// Immutable (except for `utility` and the build cursor) per-index metadata.
pub struct IndexMetadata {
    pub oid: u64,
    pub name: String,
    /// Ordered key attributes, canonicalized by ascending column position.
    pub key_attrs: Vec<ColumnId>,
    pub kind: IndexKind,
    build_cursor: AtomicU64,
    utility_bits: AtomicU64,
}

impl IndexMetadata {
    pub fn new(oid: u64, name: impl Into<String>, key_attrs: Vec<ColumnId>, kind: IndexKind) -> Self {
        let mut key_attrs = key_attrs;
        key_attrs.sort_unstable();
        Self {
            oid,
            name: name.into(),
            key_attrs,
            kind,
            build_cursor: AtomicU64::new(0),
            utility_bits: AtomicU64::new(0.5f64.to_bits()),
        }
    }

    /// The unordered key attribute set, used for exact-match comparisons
    /// against a sample's touched column set.
    pub fn key_attr_set(&self) -> std::collections::BTreeSet<ColumnId> {
        self.key_attrs.iter().copied().collect()
    }

    /// Count of contiguous tile groups, from block id 0, fully inserted
    /// into the index. Acquire load: pairs with the builder's Release
    /// store so a reader that observes cursor = C sees every insert for
    /// tile groups `[0, C)`.
    pub fn build_cursor(&self) -> u64 {
        self.build_cursor.load(Ordering::Acquire)
    }

    /// Advances the build cursor by `n` tile groups. Release store.
    pub fn advance_build_cursor(&self, n: u64) {
        self.build_cursor.fetch_add(n, Ordering::Release);
    }

    pub fn utility(&self) -> f64 {
        f64::from_bits(self.utility_bits.load(Ordering::Relaxed))
    }

    /// Only the tuner ever calls this — readers only ever read.
    pub fn set_utility(&self, utility: f64) {
        self.utility_bits.store(utility.to_bits(), Ordering::Relaxed);
    }
}

/// A uniform interface over primary-key, unique-secondary, and secondary
/// indexes. All implementations must tolerate concurrent readers and
/// writers without a table-wide lock.
pub trait Index: Send + Sync {
    /// Inserts `key → location`. Implementations key on `(key,
    /// location)` so re-inserting the same pair is a safe no-op.
    fn insert(&self, key: Key, location: TupleId) -> Result<(), IndexError>;

    /// Returns every tuple identity stored under an exact-match `key`.
    fn scan(&self, key: &Key) -> Vec<TupleId>;

    /// Returns every tuple identity in the index, regardless of key.
    fn scan_all(&self) -> Vec<TupleId>;

    fn metadata(&self) -> &IndexMetadata;
}

/// Errors an [`Index::insert`] can raise. Recoverable at the builder
/// layer: the offending index is retired rather than aborting the pass.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("duplicate key for unique index {oid}")]
    DuplicateKey { oid: u64 },
}

/// A concurrent, skiplist-backed index. `SkipMap<(Key, TupleId), ()>`
/// orders entries lexicographically by key then tuple id, so an
/// equality probe is a bounded range scan over `(key, TupleId::MIN)
/// ..= (key, TupleId::MAX)`.
pub struct SkipListIndex {
    metadata: IndexMetadata,
    map: SkipMap<(Key, TupleId), ()>,
}

impl SkipListIndex {
    pub fn new(metadata: IndexMetadata) -> Arc<Self> {
        Arc::new(Self {
            metadata,
            map: SkipMap::new(),
        })
    }
}

impl Index for SkipListIndex {
    fn insert(&self, key: Key, location: TupleId) -> Result<(), IndexError> {
        if self.metadata.kind == IndexKind::UniqueSecondary {
            let lower = (key.clone(), TupleId::MIN);
            let upper = (key.clone(), TupleId::MAX);
            let existing = self
                .map
                .range((Bound::Included(lower), Bound::Included(upper)))
                .find(|e| e.key().1 != location);
            if existing.is_some() {
                return Err(IndexError::DuplicateKey {
                    oid: self.metadata.oid,
                });
            }
        }
        self.map.insert((key, location), ());
        Ok(())
    }

    fn scan(&self, key: &Key) -> Vec<TupleId> {
        let lower = (key.clone(), TupleId::MIN);
        let upper = (key.clone(), TupleId::MAX);
        self.map
            .range((Bound::Included(lower), Bound::Included(upper)))
            .map(|e| e.key().1)
            .collect()
    }

    fn scan_all(&self) -> Vec<TupleId> {
        self.map.iter().map(|e| e.key().1).collect()
    }

    fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }
}
