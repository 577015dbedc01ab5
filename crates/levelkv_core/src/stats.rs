//! Database statistics.
//!
//! ```rust,ignore
//! let stats = db.stats();
//! println!("writes: {} flushes: {}", stats.writes(), stats.flushes());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for one open database.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    bytes_read: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
    batches: AtomicU64,
    bytes_written: AtomicU64,
    iterators: AtomicU64,
    snapshots: AtomicU64,
    flushes: AtomicU64,
    compactions: AtomicU64,
    compaction_bytes_read: AtomicU64,
    compaction_bytes_written: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, puts: u64, deletes: u64, bytes: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.puts.fetch_add(puts, Ordering::Relaxed);
        self.deletes.fetch_add(deletes, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_iterator(&self) {
        self.iterators.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self, bytes_read: u64, bytes_written: u64) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.compaction_bytes_read
            .fetch_add(bytes_read, Ordering::Relaxed);
        self.compaction_bytes_written
            .fetch_add(bytes_written, Ordering::Relaxed);
    }

    /// Point reads served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Value bytes returned by point reads.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Put operations applied, including those inside batches.
    pub fn writes(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Delete operations applied, including those inside batches.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Batches written to the log.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Encoded batch bytes written to the log.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Iterators created.
    pub fn iterators(&self) -> u64 {
        self.iterators.load(Ordering::Relaxed)
    }

    /// Snapshots taken.
    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    /// Memtables flushed to tables.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Compactions run.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Table bytes read by compactions.
    pub fn compaction_bytes_read(&self) -> u64 {
        self.compaction_bytes_read.load(Ordering::Relaxed)
    }

    /// Table bytes written by compactions.
    pub fn compaction_bytes_written(&self) -> u64 {
        self.compaction_bytes_written.load(Ordering::Relaxed)
    }
}
