//! # Index Registry
//!
//! The per-table collection of live indexes. Concurrent readers (query
//! operators picking an index to scan with) coexist with an exclusive
//! writer (the tuner adding or dropping entries). The registry never
//! compacts in place — slot ids are stable for the life of the table,
//! and a dropped slot is tombstoned (`None`) rather than removed, so
//! that iteration by index never needs remapping.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use crate::index::Index;


/// Errors signalling a registry invariant violation. These abort the
/// current tuner pass for the offending table; they are never expected
/// in normal operation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no live index with oid {0}")]
    NoSuchOid(u64),
}

/// The per-table collection of live indexes.
pub struct IndexRegistry {
    slots: RwLock<Vec<Option<Arc<dyn Index>>>>,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Number of slots, including tombstoned ones.
    pub fn count(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    /// Number of non-tombstoned entries.
    pub fn valid_count(&self) -> usize {
        self.slots.read().unwrap().iter().filter(|s| s.is_some()).count()
    }

    /// A shared reference to the index at slot `i`, or `None` if that
    /// slot is tombstoned or out of range.
    pub fn get(&self, i: usize) -> Option<Arc<dyn Index>> {
        self.slots.read().unwrap().get(i).and_then(|s| s.clone())
    }

    /// The unordered key attribute set of the index at slot `i`.
    pub fn attrs(&self, i: usize) -> Option<BTreeSet<u32>> {
        self.get(i).map(|idx| idx.metadata().key_attr_set())
    }

    /// Appends an index, returning its new slot id. Serialized with
    /// respect to other adds and drops via the write lock; the critical
    /// section is a single push.
    pub fn add(&self, index: Arc<dyn Index>) -> usize {
        let mut slots = self.slots.write().unwrap();
        let slot = slots.len();
        slots.push(Some(index));
        slot
    }

    /// Tombstones the slot whose oid matches. The underlying index
    /// (and any `Arc` a concurrent scanner already holds) is not
    /// deallocated until the last strong reference is released.
    pub fn drop_by_oid(&self, oid: u64) -> Result<(), RegistryError> {
        let mut slots = self.slots.write().unwrap();
        let slot = slots
            .iter()
            .position(|s| matches!(s, Some(idx) if idx.metadata().oid == oid));
        match slot {
            None => Err(RegistryError::NoSuchOid(oid)),
            Some(i) => {
                slots[i] = None;
                Ok(())
            }
        }
    }

    /// Iterates live (non-tombstoned) indexes along with their slot id.
    pub fn iter_live(&self) -> Vec<(usize, Arc<dyn Index>)> {
        self.slots
            .read()
            .unwrap()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.clone().map(|idx| (i, idx)))
            .collect()
    }
}
