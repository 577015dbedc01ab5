//! Database manifest.
//!
//! The manifest names the live tables, the oldest log still needed for
//! recovery, and the counters the engine resumes from.
//!
//! ```text
//! | magic "LKVM" (4) | version (2) | next_file_number (8) | last_sequence (8) |
//! | log_number (8) | table_count (4) | table_number (8)* | crc32 (4) |
//! ```

use crate::coding::{crc32, put_u16, put_u32, put_u64, verify_trailer, Decoder};
use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;

/// Magic bytes for the manifest file.
pub(crate) const MANIFEST_MAGIC: [u8; 4] = *b"LKVM";

/// Current manifest version.
pub(crate) const MANIFEST_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Manifest {
    pub(crate) next_file_number: u64,
    pub(crate) last_sequence: SequenceNumber,
    /// Logs numbered below this hold nothing the tables lack.
    pub(crate) log_number: u64,
    /// Live tables, newest first.
    pub(crate) tables: Vec<u64>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            next_file_number: 1,
            last_sequence: 0,
            log_number: 0,
            tables: Vec::new(),
        }
    }
}

impl Manifest {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hands out the next file number.
    pub(crate) fn new_file_number(&mut self) -> u64 {
        let number = self.next_file_number;
        self.next_file_number += 1;
        number
    }

    /// Makes sure `number` is never handed out again.
    pub(crate) fn mark_file_number_used(&mut self, number: u64) {
        if number >= self.next_file_number {
            self.next_file_number = number + 1;
        }
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(38 + self.tables.len() * 8);
        buf.extend_from_slice(&MANIFEST_MAGIC);
        put_u16(&mut buf, MANIFEST_VERSION);
        put_u64(&mut buf, self.next_file_number);
        put_u64(&mut buf, self.last_sequence);
        put_u64(&mut buf, self.log_number);
        put_u32(&mut buf, self.tables.len() as u32);
        for number in &self.tables {
            put_u64(&mut buf, *number);
        }
        let crc = crc32(&buf);
        put_u32(&mut buf, crc);
        buf
    }

    pub(crate) fn decode(data: &[u8]) -> CoreResult<Self> {
        let content = verify_trailer(data, "manifest")?;
        let mut dec = Decoder::new(content, "manifest");

        if dec.bytes(4)? != MANIFEST_MAGIC {
            return Err(CoreError::corruption("manifest: invalid magic"));
        }
        let version = dec.u16()?;
        if version != MANIFEST_VERSION {
            return Err(CoreError::corruption(format!(
                "manifest: unsupported version {version}"
            )));
        }

        let next_file_number = dec.u64()?;
        let last_sequence = dec.u64()?;
        let log_number = dec.u64()?;
        let count = dec.u32()? as usize;
        let mut tables = Vec::with_capacity(count.min(dec.remaining() / 8));
        for _ in 0..count {
            tables.push(dec.u64()?);
        }
        if !dec.is_empty() {
            return Err(CoreError::corruption("manifest: trailing bytes"));
        }
        if tables.iter().any(|n| *n >= next_file_number) || log_number > next_file_number {
            return Err(CoreError::corruption(
                "manifest: file number beyond next_file_number",
            ));
        }

        Ok(Self {
            next_file_number,
            last_sequence,
            log_number,
            tables,
        })
    }
}
