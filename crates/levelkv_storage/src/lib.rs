//! # LevelKV Storage
//!
//! Byte-store backends used by the LevelKV engine for its write-ahead logs
//! and sorted table files.
//!
//! Backends are **opaque byte stores**: they append, read back, flush and
//! sync. They know nothing about log records, blocks or keys; the engine owns
//! every format.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - one OS file per backend, used for on-disk databases
//! - [`InMemoryBackend`] - a growable buffer, used for in-memory databases
//!
//! ## Example
//!
//! ```rust
//! use levelkv_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"block").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"block");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
