//! Database configuration.

use crate::cache::BlockCache;
use crate::logger::Logger;
use crate::snapshot::Snapshot;
use std::fmt;
use std::sync::Arc;

/// Default memtable size before it is flushed to a table.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Default target size of a table data block.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;

/// Capacity of the block cache a database creates when none is supplied.
pub const DEFAULT_CACHE_CAPACITY: usize = 8 * 1024 * 1024;

/// Number of tables that triggers a compaction.
pub const DEFAULT_L0_COMPACTION_TRIGGER: usize = 4;

/// Configuration for opening a database.
#[derive(Clone)]
pub struct Options {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Treat any detected corruption as fatal instead of skipping past it.
    pub paranoid_checks: bool,

    /// Memtable size that triggers a flush to a sorted table.
    pub write_buffer_size: usize,

    /// Approximate size of uncompressed table data blocks.
    pub block_size: usize,

    /// Number of tables that triggers a full compaction.
    pub l0_compaction_trigger: usize,

    /// Shared block cache. A private cache of [`DEFAULT_CACHE_CAPACITY`]
    /// is created when unset.
    pub block_cache: Option<Arc<BlockCache>>,

    /// Info-log sink. Defaults to [`TracingLogger`](crate::TracingLogger).
    pub info_log: Option<Arc<dyn Logger>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            l0_compaction_trigger: DEFAULT_L0_COMPACTION_TRIGGER,
            block_cache: None,
            info_log: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("paranoid_checks", &self.paranoid_checks)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("block_size", &self.block_size)
            .field("l0_compaction_trigger", &self.l0_compaction_trigger)
            .field("block_cache", &self.block_cache)
            .field("info_log", &self.info_log.is_some())
            .finish()
    }
}

impl Options {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether corruption is fatal.
    #[must_use]
    pub const fn paranoid_checks(mut self, value: bool) -> Self {
        self.paranoid_checks = value;
        self
    }

    /// Sets the memtable flush threshold. Zero keeps the default.
    #[must_use]
    pub const fn write_buffer_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.write_buffer_size = size;
        }
        self
    }

    /// Sets the data block size. Zero keeps the default.
    #[must_use]
    pub const fn block_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.block_size = size;
        }
        self
    }

    /// Sets the compaction trigger. Values below 2 are raised to 2.
    #[must_use]
    pub const fn l0_compaction_trigger(mut self, tables: usize) -> Self {
        self.l0_compaction_trigger = if tables < 2 { 2 } else { tables };
        self
    }

    /// Attaches a shared block cache.
    #[must_use]
    pub fn block_cache(mut self, cache: Arc<BlockCache>) -> Self {
        self.block_cache = Some(cache);
        self
    }

    /// Attaches an info-log sink.
    #[must_use]
    pub fn info_log(mut self, logger: Arc<dyn Logger>) -> Self {
        self.info_log = Some(logger);
        self
    }
}

/// Options for reads and iterators.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'a> {
    /// Verify block checksums on every read from disk.
    pub verify_checksums: bool,

    /// Keep blocks read by this operation in the block cache.
    pub fill_cache: bool,

    /// Read as of this snapshot instead of the latest state.
    pub snapshot: Option<&'a Snapshot>,
}

impl Default for ReadOptions<'_> {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        }
    }
}

impl<'a> ReadOptions<'a> {
    /// Creates read options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets checksum verification.
    #[must_use]
    pub const fn verify_checksums(mut self, value: bool) -> Self {
        self.verify_checksums = value;
        self
    }

    /// Sets whether blocks read are cached.
    #[must_use]
    pub const fn fill_cache(mut self, value: bool) -> Self {
        self.fill_cache = value;
        self
    }

    /// Reads as of `snapshot`.
    #[must_use]
    pub const fn snapshot(mut self, snapshot: &'a Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Options for writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Sync the log to stable storage before the write returns.
    pub sync: bool,
}

impl WriteOptions {
    /// Creates write options with `sync` set as given.
    #[must_use]
    pub const fn new(sync: bool) -> Self {
        Self { sync }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = Options::default();
        assert!(options.create_if_missing);
        assert!(!options.error_if_exists);
        assert!(!options.paranoid_checks);
        assert_eq!(options.write_buffer_size, DEFAULT_WRITE_BUFFER_SIZE);
        assert_eq!(options.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(options.l0_compaction_trigger, DEFAULT_L0_COMPACTION_TRIGGER);
        assert!(options.block_cache.is_none());
    }

    #[test]
    fn builder_pattern() {
        let options = Options::new()
            .create_if_missing(false)
            .paranoid_checks(true)
            .write_buffer_size(1024)
            .block_size(0)
            .l0_compaction_trigger(1);

        assert!(!options.create_if_missing);
        assert!(options.paranoid_checks);
        assert_eq!(options.write_buffer_size, 1024);
        assert_eq!(options.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(options.l0_compaction_trigger, 2);
    }

    #[test]
    fn read_and_write_defaults() {
        let read = ReadOptions::default();
        assert!(read.fill_cache);
        assert!(!read.verify_checksums);
        assert!(read.snapshot.is_none());
        assert!(!WriteOptions::default().sync);
        assert!(WriteOptions::new(true).sync);
    }
}
