//! Immutable sorted tables.
//!
//! A table holds internal-key entries in order, split into checksummed
//! data blocks of roughly `block_size` bytes.
//!
//! ```text
//! | data block 0 | ... | data block N | index block | footer (32) |
//!
//! index block: | count (4) | [smallest internal key] | (last internal key | offset (8) | size (4))* | crc32 (4) |
//! footer:      | index_offset (8) | index_size (4) | max_sequence (8) | entry_count (8) | magic "LKVT" (4) |
//! ```

mod block;
mod builder;
mod reader;

pub(crate) use block::{Block, BlockBuilder};
pub(crate) use builder::{TableBuilder, TableSummary};
pub(crate) use reader::Table;

use crate::coding::{crc32, put_u32, put_u64, u32_at, u64_at, verify_trailer, Decoder};
use crate::error::{CoreError, CoreResult};
use crate::types::InternalKey;

/// Magic bytes closing every table file.
pub(crate) const TABLE_MAGIC: [u8; 4] = *b"LKVT";

pub(crate) const FOOTER_SIZE: usize = 32;

/// Per-read knobs threaded from [`ReadOptions`](crate::ReadOptions).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadContext {
    pub(crate) verify_checksums: bool,
    pub(crate) fill_cache: bool,
}

impl ReadContext {
    /// Settings for background work: verify everything, cache nothing.
    pub(crate) const fn background() -> Self {
        Self {
            verify_checksums: true,
            fill_cache: false,
        }
    }
}

/// Location of a data block and the largest key it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    pub(crate) last_key: InternalKey,
    pub(crate) offset: u64,
    pub(crate) size: u32,
}

pub(crate) fn encode_index(smallest: Option<&InternalKey>, entries: &[IndexEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, entries.len() as u32);
    if let (Some(smallest), false) = (smallest, entries.is_empty()) {
        smallest.encode_into(&mut buf);
    }
    for entry in entries {
        entry.last_key.encode_into(&mut buf);
        put_u64(&mut buf, entry.offset);
        put_u32(&mut buf, entry.size);
    }
    let crc = crc32(&buf);
    put_u32(&mut buf, crc);
    buf
}

pub(crate) fn decode_index(data: &[u8]) -> CoreResult<(Option<InternalKey>, Vec<IndexEntry>)> {
    let content = verify_trailer(data, "table index")?;
    let mut dec = Decoder::new(content, "table index");
    let count = dec.u32()? as usize;
    let smallest = if count > 0 {
        Some(InternalKey::decode(&mut dec)?)
    } else {
        None
    };
    let mut entries = Vec::with_capacity(count.min(content.len()));
    for _ in 0..count {
        let last_key = InternalKey::decode(&mut dec)?;
        let offset = dec.u64()?;
        let size = dec.u32()?;
        entries.push(IndexEntry {
            last_key,
            offset,
            size,
        });
    }
    if !dec.is_empty() {
        return Err(CoreError::corruption("table index: trailing bytes"));
    }
    Ok((smallest, entries))
}

/// Fixed-size trailer locating the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Footer {
    pub(crate) index_offset: u64,
    pub(crate) index_size: u32,
    pub(crate) max_sequence: u64,
    pub(crate) entry_count: u64,
}

impl Footer {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOOTER_SIZE);
        put_u64(&mut buf, self.index_offset);
        put_u32(&mut buf, self.index_size);
        put_u64(&mut buf, self.max_sequence);
        put_u64(&mut buf, self.entry_count);
        buf.extend_from_slice(&TABLE_MAGIC);
        buf
    }

    pub(crate) fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() != FOOTER_SIZE || data[28..] != TABLE_MAGIC {
            return Err(CoreError::corruption("table footer: bad magic"));
        }
        let field = |offset| u64_at(data, offset).unwrap_or(0);
        Ok(Self {
            index_offset: field(0),
            index_size: u32_at(data, 8).unwrap_or(0),
            max_sequence: field(12),
            entry_count: field(20),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    #[test]
    fn footer_layout() {
        let footer = Footer {
            index_offset: 4096,
            index_size: 77,
            max_sequence: 9,
            entry_count: 120,
        };
        let data = footer.encode();
        assert_eq!(data.len(), FOOTER_SIZE);
        assert_eq!(&data[28..], b"LKVT");
        assert_eq!(Footer::decode(&data).unwrap(), footer);

        let mut bad = data.clone();
        bad[31] = b'X';
        assert!(Footer::decode(&bad).unwrap_err().is_corruption());
    }

    #[test]
    fn index_keeps_entries_and_smallest() {
        let smallest = InternalKey::new(b"a", 3, ValueKind::Value);
        let entries = vec![
            IndexEntry {
                last_key: InternalKey::new(b"m", 1, ValueKind::Value),
                offset: 0,
                size: 100,
            },
            IndexEntry {
                last_key: InternalKey::new(b"z", 2, ValueKind::Deletion),
                offset: 100,
                size: 50,
            },
        ];
        let data = encode_index(Some(&smallest), &entries);
        let (decoded_smallest, decoded) = decode_index(&data).unwrap();
        assert_eq!(decoded_smallest, Some(smallest));
        assert_eq!(decoded, entries);

        let (none, empty) = decode_index(&encode_index(None, &[])).unwrap();
        assert!(none.is_none());
        assert!(empty.is_empty());
    }
}
