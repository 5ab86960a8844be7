//! # Sample Ring
//!
//! A per-table, append-only buffer of workload observations. Query and
//! insert operators are producers; the tuner is the sole consumer and
//! only ever drains in bulk between analysis passes.
//!
//! `record` is built to never block a producer for longer than the
//! time to acquire a coarse lock on a growable vector. A lock-free SPSC
//! ring is the wrong tool here: there are many producers, and ordering
//! is not semantically significant, so a coarse mutex over a `VecDeque`
//! is both simpler and sufficient.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tile::ColumnId;


/// The kind of workload observation a [`Sample`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// A read (scan/lookup) that touched a known set of columns.
    Access,
    /// A write (insert/update/delete).
    Update,
}

/// A single, immutable workload observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub kind: SampleKind,
    /// For `Access` samples, the predicate/key columns touched. Empty
    /// or irrelevant for `Update` samples.
    pub columns: Vec<ColumnId>,
    /// Measured duration of the operation.
    pub weight: f64,
    /// Same duration, used as the histogram accumulation metric.
    pub metric: f64,
    pub selectivity: Option<f64>,
}

impl Sample {
    pub fn access(columns: Vec<ColumnId>, duration: f64) -> Self {
        Self {
            kind: SampleKind::Access,
            columns,
            weight: duration,
            metric: duration,
            selectivity: None,
        }
    }

    pub fn update(duration: f64) -> Self {
        Self {
            kind: SampleKind::Update,
            columns: Vec::new(),
            weight: duration,
            metric: duration,
            selectivity: None,
        }
    }
}

/// A bounded, append-only buffer of [`Sample`]s owned by a table.
///
/// `record` is the hot path: many producers append concurrently. A
/// single coarse `Mutex` guards a `VecDeque` — contention is brief
/// because the critical section is a single push (and, on overflow, a
/// single pop). `drain` is the cold path, called only by the tuner.
pub struct SampleRing {
    inner: Mutex<VecDeque<Sample>>,
    capacity: Option<usize>,
    dropped: AtomicU64,
}

impl SampleRing {
    /// `capacity = None` means unbounded (samples accumulate until the
    /// next drain, with no loss).
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends a sample. On overflow of the configured capacity, drops
    /// the oldest sample and increments the dropped-count counter.
    pub fn record(&self, sample: Sample) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(cap) = self.capacity {
            if guard.len() >= cap {
                guard.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        guard.push_back(sample);
    }

    /// Atomically takes the current contents and resets the ring to empty.
    pub fn drain(&self) -> Vec<Sample> {
        let mut guard = self.inner.lock().unwrap();
        std::mem::take(&mut *guard).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples dropped due to capacity overflow, for observability.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
