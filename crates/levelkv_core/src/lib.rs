//! # LevelKV Core
//!
//! Embedded, ordered key-value storage engine.
//!
//! Keys and values are arbitrary byte strings; keys are ordered
//! lexicographically by unsigned byte value.
//!
//! This crate provides:
//! - Point reads and writes, and atomic multi-operation batches
//! - Bidirectional iterators over a consistent view
//! - Snapshots for repeatable reads
//! - Crash recovery from a write-ahead log
//! - Background-free compaction into sorted tables with a shared block cache
//! - Repair and destruction of database directories
//!
//! ## Example
//!
//! ```rust
//! use levelkv_core::{Db, Options, ReadOptions, WriteBatch, WriteOptions};
//!
//! let db = Db::open_in_memory(Options::default()).unwrap();
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"apple", b"red");
//! batch.put(b"banana", b"yellow");
//! db.write(&WriteOptions::default(), &batch).unwrap();
//!
//! let mut it = db.iter(&ReadOptions::default()).unwrap();
//! it.seek_to_first();
//! assert_eq!(it.key(), Some(&b"apple"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod cache;
mod coding;
mod compaction;
mod db;
mod dir;
mod error;
mod iterator;
mod log;
mod logger;
mod manifest;
mod memtable;
mod options;
mod repair;
mod snapshot;
mod stats;
mod table;
mod types;
mod version;

pub use batch::{BatchIter, BatchOp, WriteBatch};
pub use cache::BlockCache;
pub use coding::crc32;
pub use db::{Db, NUM_LEVELS};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use iterator::DbIterator;
pub use logger::{Logger, MemoryLogger, TracingLogger};
pub use options::{
    Options, ReadOptions, WriteOptions, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY,
    DEFAULT_L0_COMPACTION_TRIGGER, DEFAULT_WRITE_BUFFER_SIZE,
};
pub use repair::{destroy_db, repair_db};
pub use snapshot::Snapshot;
pub use stats::DatabaseStats;
pub use types::{SequenceNumber, ValueKind, MAX_SEQUENCE};
