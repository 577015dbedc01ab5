//! In-memory write buffer.
//!
//! Entries are keyed by [`InternalKey`] in a lock-free skip list, so readers
//! never block the single writer. A memtable only grows; once it reaches the
//! write buffer size it is flushed to a table and replaced.

use crate::types::{InternalKey, SequenceNumber, ValueKind, Versioned, MAX_SEQUENCE};
use crossbeam_skiplist::SkipMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bookkeeping charged per entry on top of key and value bytes.
const ENTRY_OVERHEAD: usize = 48;

#[derive(Debug, Default)]
pub(crate) struct MemTable {
    map: SkipMap<InternalKey, Vec<u8>>,
    usage: AtomicUsize,
}

impl MemTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, sequence: SequenceNumber, kind: ValueKind, key: &[u8], value: &[u8]) {
        self.usage
            .fetch_add(key.len() + value.len() + ENTRY_OVERHEAD, Ordering::Relaxed);
        self.map
            .insert(InternalKey::new(key, sequence, kind), value.to_vec());
    }

    /// Newest version of `key` with a sequence at or below `sequence`.
    pub(crate) fn get(&self, key: &[u8], sequence: SequenceNumber) -> Option<Versioned> {
        let target = InternalKey::seek(key, sequence);
        self.map
            .lower_bound(Bound::Included(&target))
            .filter(|entry| entry.key().user_key() == key)
            .map(|entry| Versioned::from_entry(entry.key(), entry.value()))
    }

    /// User key of the first entry at or after `target`.
    pub(crate) fn first_key_at_or_after(&self, target: &InternalKey) -> Option<Vec<u8>> {
        self.map
            .lower_bound(Bound::Included(target))
            .map(|entry| entry.key().user_key().to_vec())
    }

    /// Largest user key strictly below `bound`, or the largest key overall.
    pub(crate) fn last_key_before(&self, bound: Option<&[u8]>) -> Option<Vec<u8>> {
        let entry = match bound {
            Some(bound) => self
                .map
                .upper_bound(Bound::Excluded(&InternalKey::seek(bound, MAX_SEQUENCE))),
            None => self.map.back(),
        };
        entry.map(|entry| entry.key().user_key().to_vec())
    }

    /// Every entry in internal-key order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (InternalKey, Vec<u8>)> + '_ {
        self.map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
    }

    pub(crate) fn approximate_memory_usage(&self) -> usize {
        self.usage.load(Ordering::Relaxed)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
