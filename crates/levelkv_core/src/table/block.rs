//! Table data blocks.
//!
//! ```text
//! | (internal key | value_len (4) | value)* | count (4) | crc32 (4) |
//! ```

use crate::coding::{crc32, put_slice, put_u32, u32_at, verify_trailer, Decoder};
use crate::error::{CoreError, CoreResult};
use crate::types::InternalKey;

/// A decoded, immutable data block.
#[derive(Debug)]
pub(crate) struct Block {
    entries: Vec<(InternalKey, Vec<u8>)>,
    charge: usize,
}

impl Block {
    /// Decodes a block. The checksum is verified only when `verify` is set;
    /// structural errors are always reported.
    pub(crate) fn decode(data: &[u8], verify: bool) -> CoreResult<Self> {
        let content = if verify {
            verify_trailer(data, "table block")?
        } else if data.len() >= 4 {
            &data[..data.len() - 4]
        } else {
            return Err(CoreError::corruption("table block: too short"));
        };

        if content.len() < 4 {
            return Err(CoreError::corruption("table block: missing entry count"));
        }
        let (body, count_bytes) = content.split_at(content.len() - 4);
        let count = u32_at(count_bytes, 0).unwrap_or(0) as usize;

        let mut dec = Decoder::new(body, "table block");
        let mut entries = Vec::with_capacity(count.min(body.len()));
        for _ in 0..count {
            let key = InternalKey::decode(&mut dec)?;
            let value = dec.slice()?.to_vec();
            entries.push((key, value));
        }
        if !dec.is_empty() {
            return Err(CoreError::corruption(format!(
                "table block: {} trailing bytes after {count} entries",
                dec.remaining()
            )));
        }
        if entries.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
            return Err(CoreError::corruption("table block: entries out of order"));
        }

        Ok(Self {
            entries,
            charge: data.len(),
        })
    }

    /// Index of the first entry at or after `target`.
    pub(crate) fn seek(&self, target: &InternalKey) -> usize {
        self.entries.partition_point(|(key, _)| key < target)
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&(InternalKey, Vec<u8>)> {
        self.entries.get(index)
    }

    /// User key of the last entry strictly before `target`.
    pub(crate) fn last_key_before(&self, target: &InternalKey) -> Option<&[u8]> {
        let index = self.seek(target);
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|(key, _)| key.user_key())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Bytes charged against the block cache.
    pub(crate) fn charge(&self) -> usize {
        self.charge
    }
}

/// Accumulates entries for one data block.
#[derive(Debug, Default)]
pub(crate) struct BlockBuilder {
    buf: Vec<u8>,
    count: u32,
}

impl BlockBuilder {
    pub(crate) fn add(&mut self, key: &InternalKey, value: &[u8]) {
        key.encode_into(&mut self.buf);
        put_slice(&mut self.buf, value);
        self.count += 1;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn estimated_size(&self) -> usize {
        self.buf.len() + 8
    }

    /// Seals the block and resets the builder.
    pub(crate) fn finish(&mut self) -> Vec<u8> {
        let mut data = std::mem::take(&mut self.buf);
        put_u32(&mut data, self.count);
        let crc = crc32(&data);
        put_u32(&mut data, crc);
        self.count = 0;
        data
    }
}
