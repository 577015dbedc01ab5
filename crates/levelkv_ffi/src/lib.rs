//! # LevelKV FFI
//!
//! Stable C ABI for embedding LevelKV in managed host languages.
//!
//! This crate provides:
//! - Opaque handles for databases, iterators, snapshots and write batches
//! - Memory ownership conventions for keys, values and strings
//! - Result codes, failure names and a thread-local last error
//! - A log sink for engine and iterator diagnostics
//!
//! ## Ownership
//!
//! Every handle is created by one function and released by its matching
//! close. Closing null is always a no-op. Buffers and strings returned to
//! the host are freed with `levelkv_free_buffer` / `levelkv_free_string`.
//! Input bytes are only borrowed for the duration of the call.
//!
//! ## Errors
//!
//! Functions return a [`LevelKvResult`]. On failure the message is
//! available from `levelkv_last_error` and the failure the host should
//! raise from `levelkv_failure_name`.

#![warn(missing_docs)]

mod batch;
mod buffer;
mod database;
mod error;
mod handle;
mod iterator;
mod logging;
mod session;
mod types;

pub use batch::*;
pub use buffer::{levelkv_free_buffer, levelkv_free_string, LevelKvBuffer, LevelKvString};
pub use database::*;
pub use error::{
    clear_last_error, levelkv_clear_error, levelkv_failure_name, levelkv_last_error,
    set_last_error, ErrorCode, FfiError, FfiResult, LevelKvResult,
};
pub use iterator::*;
pub use logging::{emit, levelkv_set_log_sink, HostLogger, ENGINE_COMPONENT, ITERATOR_COMPONENT};
pub use session::DatabaseSession;
pub use types::{
    LevelKvDatabase, LevelKvIterator, LevelKvLogSink, LevelKvOpenOptions, LevelKvSnapshot,
    LevelKvWriteBatch,
};
