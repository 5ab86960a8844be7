//! # Transaction Manager Interface
//!
//! The tuner never decides visibility itself — it consults whatever
//! transaction manager the surrounding engine supplies. This module
//! defines that narrow contract ([`TransactionManager`]) plus the row
//! metadata it operates over ([`TileGroupHeader`]), and ships one
//! concrete, minimal MVCC-lite implementation ([`SimpleTransactionManager`])
//! so the rest of the crate can be built and tested without a real
//! concurrency control stack.
//!
//! ## Contract
//!
//! - [`TransactionManager::is_visible`] decides whether a given row
//!   version is visible to a snapshot. Read-only, side-effect-free.
//! - [`TransactionManager::perform_read`] registers a read in the
//!   calling transaction; `false` means the transaction must abort.
//! - [`TransactionManager::max_committed_cid`] bounds which commit ids
//!   are definitely safe to garbage-collect.
//!
//! The tuner treats tile group headers as read-only and only reaches
//! into them through this trait — it never mutates `begin_cid`,
//! `end_cid`, or `txn_id` directly, except for the cooperative chain
//! cleanup in the hybrid scan (see [`crate::scan`]), which goes through
//! a single atomic compare-and-set on `txn_id`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tile::TupleId;

/// Sentinel transaction id meaning "no owner" / "reset by cleanup".
pub const INVALID_TXN_ID: u64 = u64::MAX;

/// Sentinel end-commit-id meaning "not yet deleted".
pub const INF_CID: u64 = u64::MAX;

/// Per-row MVCC metadata, maintained by the transaction layer.
///
/// The tuner accesses these fields only through [`TransactionManager`];
/// it never interprets `begin_cid`/`end_cid` itself.
pub struct TileGroupHeader {
    begin_cid: Vec<AtomicU64>,
    end_cid: Vec<AtomicU64>,
    txn_id: Vec<AtomicU64>,
    next_item_pointer: Vec<Mutex<Option<TupleId>>>,
}

impl TileGroupHeader {
    /// Allocates header storage for `capacity` row slots, all initially
    /// committed at cid 0 with no end-of-life and no chained version.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut begin_cid = Vec::with_capacity(capacity);
        let mut end_cid = Vec::with_capacity(capacity);
        let mut txn_id = Vec::with_capacity(capacity);
        let mut next_item_pointer = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            begin_cid.push(AtomicU64::new(0));
            end_cid.push(AtomicU64::new(INF_CID));
            txn_id.push(AtomicU64::new(INVALID_TXN_ID));
            next_item_pointer.push(Mutex::new(None));
        }
        Self {
            begin_cid,
            end_cid,
            txn_id,
            next_item_pointer,
        }
    }

    /// Records a row as committed at `cid` with no subsequent version.
    pub fn install(&self, offset: u32, begin_cid: u64) {
        let offset = offset as usize;
        self.begin_cid[offset].store(begin_cid, Ordering::Release);
        self.end_cid[offset].store(INF_CID, Ordering::Release);
    }

    /// Marks a row as superseded by `next`, ending its visibility at `end_cid`.
    pub fn supersede(&self, offset: u32, end_cid: u64, next: TupleId) {
        let offset = offset as usize;
        self.end_cid[offset].store(end_cid, Ordering::Release);
        *self.next_item_pointer[offset].lock().unwrap() = Some(next);
    }

    pub fn begin_cid(&self, offset: u32) -> u64 {
        self.begin_cid[offset as usize].load(Ordering::Acquire)
    }

    pub fn end_cid(&self, offset: u32) -> u64 {
        self.end_cid[offset as usize].load(Ordering::Acquire)
    }

    pub fn txn_id(&self, offset: u32) -> u64 {
        self.txn_id[offset as usize].load(Ordering::Acquire)
    }

    pub fn next_item_pointer(&self, offset: u32) -> Option<TupleId> {
        *self.next_item_pointer[offset as usize].lock().unwrap()
    }

    /// Cooperative cleanup primitive: atomically reset a stale owner
    /// transaction id to [`INVALID_TXN_ID`]. Losing the race is benign —
    /// callers must not treat `false` as an error.
    pub fn try_reset_txn_id(&self, offset: u32, expected: u64) -> bool {
        self.txn_id[offset as usize]
            .compare_exchange(
                expected,
                INVALID_TXN_ID,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn set_prev_item_pointer_invalid(&self, offset: u32) {
        *self.next_item_pointer[offset as usize].lock().unwrap() = None;
    }
}

/// A transaction's read snapshot: the commit id below which rows are
/// eligible to be visible.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub read_cid: u64,
}

/// The narrow contract the tuner and the hybrid scan consume from the
/// surrounding engine's concurrency control layer.
pub trait TransactionManager: Send + Sync {
    /// Whether the row at `offset` in `header` is visible to `snapshot`.
    fn is_visible(&self, header: &TileGroupHeader, offset: u32, snapshot: &Snapshot) -> bool;

    /// Registers a read of `tuple_id` in the calling transaction.
    /// Returns `false` if the read must abort the transaction.
    fn perform_read(&self, tuple_id: TupleId) -> bool;

    /// The highest commit id known to be fully committed.
    fn max_committed_cid(&self) -> u64;
}

/// A minimal MVCC-lite transaction manager: a row is visible iff its
/// `begin_cid` is at or before the snapshot's read cid and its
/// `end_cid` is strictly after it. `perform_read` always succeeds —
/// there is no conflict detection here, since the tuner subsystem does
/// not redesign the concurrency manager.
pub struct SimpleTransactionManager {
    next_cid: AtomicU64,
}

impl Default for SimpleTransactionManager {
    fn default() -> Self {
        Self {
            next_cid: AtomicU64::new(1),
        }
    }
}

impl SimpleTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates and commits the next ascending commit id. Every insert
    /// in the test/bench harness uses this to obtain a `begin_cid`.
    pub fn next_commit_id(&self) -> u64 {
        self.next_cid.fetch_add(1, Ordering::AcqRel)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            read_cid: self.next_cid.load(Ordering::Acquire),
        }
    }
}

impl TransactionManager for SimpleTransactionManager {
    fn is_visible(&self, header: &TileGroupHeader, offset: u32, snapshot: &Snapshot) -> bool {
        let begin = header.begin_cid(offset);
        let end = header.end_cid(offset);
        begin != 0 && begin <= snapshot.read_cid && snapshot.read_cid < end
    }

    fn perform_read(&self, _tuple_id: TupleId) -> bool {
        true
    }

    fn max_committed_cid(&self) -> u64 {
        self.next_cid.load(Ordering::Acquire).saturating_sub(1)
    }
}
