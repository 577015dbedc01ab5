//! Write-ahead log.
//!
//! Every write batch is appended to the current log before it touches the
//! memtable. On open, logs newer than the manifest's log number are replayed
//! to rebuild the memtable.
//!
//! ## Record Format
//!
//! ```text
//! | magic "LKVL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The checksum covers everything before it.
//!
//! ## Recovery Policy
//!
//! - A truncated header or payload at the end of a log is a clean end of log:
//!   the write never completed.
//! - A checksum mismatch, bad magic, unknown type or future version is
//!   corruption. What happens next depends on the [`RecoveryMode`]:
//!   [`Strict`](RecoveryMode::Strict) fails, [`TolerateTail`](RecoveryMode::TolerateTail)
//!   drops the rest of the log, and [`Resync`](RecoveryMode::Resync) skips
//!   ahead to the next record magic.

mod reader;
mod record;
mod writer;

pub(crate) use reader::{LogReader, RecoveryMode};
pub(crate) use writer::LogWriter;
