//! Point-in-time read views.

use crate::types::SequenceNumber;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Sequences pinned by live snapshots, with reference counts.
#[derive(Debug, Default)]
pub(crate) struct SnapshotList {
    live: Mutex<BTreeMap<SequenceNumber, usize>>,
}

impl SnapshotList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, sequence: SequenceNumber) {
        *self.live.lock().entry(sequence).or_insert(0) += 1;
    }

    fn release(&self, sequence: SequenceNumber) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                live.remove(&sequence);
            }
        }
    }

    /// Oldest pinned sequence, if any snapshot is live.
    pub(crate) fn oldest(&self) -> Option<SequenceNumber> {
        self.live.lock().keys().next().copied()
    }

    /// Number of live snapshots.
    pub(crate) fn len(&self) -> usize {
        self.live.lock().values().sum()
    }
}

/// A consistent read view of a database as of one sequence number.
///
/// Reads through a snapshot see exactly the writes committed before it was
/// taken. Compaction keeps every version a live snapshot can see; dropping
/// the snapshot releases them.
pub struct Snapshot {
    sequence: SequenceNumber,
    db_id: u64,
    list: Arc<SnapshotList>,
}

impl Snapshot {
    pub(crate) fn new(sequence: SequenceNumber, db_id: u64, list: Arc<SnapshotList>) -> Self {
        list.acquire(sequence);
        Self {
            sequence,
            db_id,
            list,
        }
    }

    /// The last sequence visible through this snapshot.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Identity of the database that created this snapshot.
    #[must_use]
    pub fn db_id(&self) -> u64 {
        self.db_id
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.list.release(self.sequence);
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("sequence", &self.sequence)
            .field("db_id", &self.db_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_pin_oldest_sequence() {
        let list = Arc::new(SnapshotList::new());
        assert!(list.oldest().is_none());

        let a = Snapshot::new(5, 1, Arc::clone(&list));
        let b = Snapshot::new(9, 1, Arc::clone(&list));
        let c = Snapshot::new(5, 1, Arc::clone(&list));
        assert_eq!(list.oldest(), Some(5));
        assert_eq!(list.len(), 3);

        drop(a);
        assert_eq!(list.oldest(), Some(5));
        drop(c);
        assert_eq!(list.oldest(), Some(9));
        assert_eq!(b.sequence(), 9);
        drop(b);
        assert!(list.oldest().is_none());
        assert_eq!(list.len(), 0);
    }
}
