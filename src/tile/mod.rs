//! # Tile Groups and Tables
//!
//! A stand-in for the engine's catalog/table loader, narrow enough to
//! exercise the tuner without pulling in a full storage engine. A
//! [`Table`] owns an append-only sequence of [`TileGroup`]s, an
//! [`IndexRegistry`](crate::registry::IndexRegistry), and a
//! [`SampleRing`](crate::sample::SampleRing).
//!
//! Tile groups are horizontally partitioned, append-only blocks of
//! rows, addressed by a monotonically assigned block id. A row's
//! identity is the pair `(block id, offset)` — stable for the life of
//! the row.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::registry::IndexRegistry;
use crate::sample::SampleRing;
use crate::txn::TileGroupHeader;

pub mod value;
pub use value::Value;


/// A column position in the table schema.
pub type ColumnId = u32;

/// A tuple identity: `(block id, row offset)`, stable for the life of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TupleId {
    pub block: u64,
    pub offset: u32,
}

impl TupleId {
    pub const MIN: TupleId = TupleId {
        block: u64::MIN,
        offset: u32::MIN,
    };
    pub const MAX: TupleId = TupleId {
        block: u64::MAX,
        offset: u32::MAX,
    };
}

/// A horizontally partitioned, append-only block of a table's rows.
pub struct TileGroup {
    pub id: u64,
    rows: RwLock<Vec<Vec<Value>>>,
    next_slot: AtomicU32,
    pub header: TileGroupHeader,
}

impl TileGroup {
    const CAPACITY: usize = 1024;

    pub fn new(id: u64) -> Self {
        Self {
            id,
            rows: RwLock::new(Vec::with_capacity(Self::CAPACITY)),
            next_slot: AtomicU32::new(0),
            header: TileGroupHeader::with_capacity(Self::CAPACITY),
        }
    }

    /// Number of occupied row slots — the bound the builder and the
    /// sequential scan iterate over.
    pub fn next_tuple_slot(&self) -> u32 {
        self.next_slot.load(Ordering::Acquire)
    }

    /// Inserts a fully-formed row, committed at `begin_cid`. Returns the
    /// offset the row was placed at, or `None` if this tile group is full.
    pub fn insert(&self, row: Vec<Value>, begin_cid: u64) -> Option<u32> {
        let mut rows = self.rows.write().unwrap();
        if rows.len() >= Self::CAPACITY {
            return None;
        }
        let offset = rows.len() as u32;
        rows.push(row);
        self.header.install(offset, begin_cid);
        self.next_slot.store(rows.len() as u32, Ordering::Release);
        Some(offset)
    }

    /// Copies the row at `offset`. Mirrors `TileGroup::CopyTuple` in the
    /// original — the builder and scan both need an owned copy to form
    /// keys / evaluate predicates without holding the row lock.
    pub fn copy_tuple(&self, offset: u32) -> Option<Vec<Value>> {
        self.rows.read().unwrap().get(offset as usize).cloned()
    }
}

/// A table: an append-only sequence of tile groups plus the live index
/// registry and sample ring that the tuner and hybrid scan operate on.
pub struct Table {
    pub name: String,
    schema_len: usize,
    tile_groups: RwLock<Vec<std::sync::Arc<TileGroup>>>,
    next_block_id: AtomicU32,
    pub registry: IndexRegistry,
    pub samples: SampleRing,
}

impl Table {
    pub fn new(name: impl Into<String>, schema_len: usize) -> Self {
        Self {
            name: name.into(),
            schema_len,
            tile_groups: RwLock::new(Vec::new()),
            next_block_id: AtomicU32::new(0),
            registry: IndexRegistry::new(),
            samples: SampleRing::new(None),
        }
    }

    pub fn schema_len(&self) -> usize {
        self.schema_len
    }

    /// Total number of tile groups currently in the table.
    pub fn tile_group_count(&self) -> u64 {
        self.tile_groups.read().unwrap().len() as u64
    }

    /// A point-in-time snapshot of the tile group list. Tile groups
    /// themselves are append-only once created, so cloning the `Arc`s
    /// here is sufficient for callers to iterate safely while writers
    /// keep appending new ones concurrently.
    pub fn tile_groups_snapshot(&self) -> Vec<std::sync::Arc<TileGroup>> {
        self.tile_groups.read().unwrap().clone()
    }

    pub fn tile_group(&self, offset: u64) -> Option<std::sync::Arc<TileGroup>> {
        self.tile_groups
            .read()
            .unwrap()
            .get(offset as usize)
            .cloned()
    }

    /// Appends a freshly created tile group and returns its block id.
    pub fn append_tile_group(&self) -> std::sync::Arc<TileGroup> {
        let id = self.next_block_id.fetch_add(1, Ordering::AcqRel) as u64;
        let tg = std::sync::Arc::new(TileGroup::new(id));
        self.tile_groups.write().unwrap().push(tg.clone());
        tg
    }

    /// Inserts a row into the current (last) tile group, appending a
    /// fresh one first if the table is empty or the last one is full.
    pub fn insert(&self, row: Vec<Value>, begin_cid: u64) -> TupleId {
        loop {
            let last = {
                let groups = self.tile_groups.read().unwrap();
                groups.last().cloned()
            };
            let tg = match last {
                Some(tg) => tg,
                None => self.append_tile_group(),
            };
            if let Some(offset) = tg.insert(row.clone(), begin_cid) {
                return TupleId {
                    block: tg.id,
                    offset,
                };
            }
            self.append_tile_group();
        }
    }
}
