//! Table construction.

use crate::error::{CoreError, CoreResult};
use crate::table::BlockBuilder;
use crate::table::{encode_index, Footer, IndexEntry};
use crate::types::{InternalKey, SequenceNumber};
use levelkv_storage::StorageBackend;

/// What a finished table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableSummary {
    pub(crate) file_size: u64,
    pub(crate) entry_count: u64,
    pub(crate) max_sequence: SequenceNumber,
}

/// Writes entries, in internal-key order, into a new table.
pub(crate) struct TableBuilder {
    backend: Box<dyn StorageBackend>,
    block_size: usize,
    block: BlockBuilder,
    index: Vec<IndexEntry>,
    smallest: Option<InternalKey>,
    last_key: Option<InternalKey>,
    entry_count: u64,
    max_sequence: SequenceNumber,
}

impl TableBuilder {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, block_size: usize) -> Self {
        Self {
            backend,
            block_size: block_size.max(64),
            block: BlockBuilder::default(),
            index: Vec::new(),
            smallest: None,
            last_key: None,
            entry_count: 0,
            max_sequence: 0,
        }
    }

    pub(crate) fn add(&mut self, key: &InternalKey, value: &[u8]) -> CoreResult<()> {
        if let Some(last) = &self.last_key {
            if key <= last {
                return Err(CoreError::invalid_argument(
                    "table entries must be added in increasing key order",
                ));
            }
        }
        if self.smallest.is_none() {
            self.smallest = Some(key.clone());
        }

        self.block.add(key, value);
        self.last_key = Some(key.clone());
        self.entry_count += 1;
        self.max_sequence = self.max_sequence.max(key.sequence());

        if self.block.estimated_size() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    pub(crate) fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn flush_block(&mut self) -> CoreResult<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        let Some(last_key) = self.last_key.clone() else {
            return Ok(());
        };
        let data = self.block.finish();
        let offset = self.backend.append(&data)?;
        self.index.push(IndexEntry {
            last_key,
            offset,
            size: data.len() as u32,
        });
        Ok(())
    }

    /// Writes the index and footer and syncs the file.
    ///
    /// The backend is handed back so the new table can be read through it.
    pub(crate) fn finish(mut self) -> CoreResult<(Box<dyn StorageBackend>, TableSummary)> {
        self.flush_block()?;

        let index = encode_index(self.smallest.as_ref(), &self.index);
        let index_offset = self.backend.append(&index)?;
        let footer = Footer {
            index_offset,
            index_size: index.len() as u32,
            max_sequence: self.max_sequence,
            entry_count: self.entry_count,
        };
        self.backend.append(&footer.encode())?;
        self.backend.sync()?;

        let summary = TableSummary {
            file_size: self.backend.size()?,
            entry_count: self.entry_count,
            max_sequence: self.max_sequence,
        };
        Ok((self.backend, summary))
    }
}
