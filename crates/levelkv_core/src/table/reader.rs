//! Table reads.

use crate::cache::BlockCache;
use crate::error::{CoreError, CoreResult};
use crate::table::block::Block;
use crate::table::{decode_index, Footer, IndexEntry, ReadContext, FOOTER_SIZE};
use crate::types::{InternalKey, SequenceNumber, Versioned, MAX_SEQUENCE};
use levelkv_storage::{StorageBackend, StorageError};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An open, immutable table.
///
/// Tables are shared by every version that lists them. Once compaction
/// replaces a table it is marked obsolete, and its file is deleted when the
/// last reader lets go.
pub(crate) struct Table {
    number: u64,
    cache_id: u64,
    backend: Box<dyn StorageBackend>,
    path: Option<PathBuf>,
    cache: Arc<BlockCache>,
    index: Vec<IndexEntry>,
    smallest: Option<InternalKey>,
    footer: Footer,
    file_size: u64,
    obsolete: AtomicBool,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("number", &self.number)
            .field("file_size", &self.file_size)
            .field("entries", &self.footer.entry_count)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Opens a table, validating its footer and index.
    pub(crate) fn open(
        number: u64,
        backend: Box<dyn StorageBackend>,
        path: Option<PathBuf>,
        cache: Arc<BlockCache>,
    ) -> CoreResult<Self> {
        let file_size = backend.size()?;
        if file_size < FOOTER_SIZE as u64 {
            return Err(CoreError::corruption(format!(
                "table {number:06}: file too short ({file_size} bytes)"
            )));
        }

        let footer_data = backend
            .read_at(file_size - FOOTER_SIZE as u64, FOOTER_SIZE)
            .map_err(|err| truncated(number, err))?;
        let footer = Footer::decode(&footer_data).map_err(|err| annotate(number, err))?;

        let index_end = footer.index_offset.saturating_add(u64::from(footer.index_size));
        if index_end != file_size - FOOTER_SIZE as u64 {
            return Err(CoreError::corruption(format!(
                "table {number:06}: index does not end at the footer"
            )));
        }
        let index_data = backend
            .read_at(footer.index_offset, footer.index_size as usize)
            .map_err(|err| truncated(number, err))?;
        let (smallest, index) = decode_index(&index_data).map_err(|err| annotate(number, err))?;

        Ok(Self {
            number,
            cache_id: cache.new_id(),
            backend,
            path,
            cache,
            index,
            smallest,
            footer,
            file_size,
            obsolete: AtomicBool::new(false),
        })
    }

    pub(crate) fn number(&self) -> u64 {
        self.number
    }

    pub(crate) fn file_size(&self) -> u64 {
        self.file_size
    }

    pub(crate) fn max_sequence(&self) -> SequenceNumber {
        self.footer.max_sequence
    }

    pub(crate) fn entry_count(&self) -> u64 {
        self.footer.entry_count
    }

    pub(crate) fn smallest_user_key(&self) -> Option<&[u8]> {
        self.smallest.as_ref().map(InternalKey::user_key)
    }

    pub(crate) fn largest_user_key(&self) -> Option<&[u8]> {
        self.index.last().map(|entry| entry.last_key.user_key())
    }

    /// Marks the file for deletion once the table is dropped.
    pub(crate) fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }

    fn read_block(&self, index: usize, ctx: ReadContext) -> CoreResult<Arc<Block>> {
        let handle = &self.index[index];
        let cache_key = (self.cache_id, handle.offset);
        if let Some(block) = self.cache.lookup(cache_key) {
            return Ok(block);
        }

        let data = self
            .backend
            .read_at(handle.offset, handle.size as usize)
            .map_err(|err| truncated(self.number, err))?;
        let block = Arc::new(
            Block::decode(&data, ctx.verify_checksums).map_err(|err| annotate(self.number, err))?,
        );
        if ctx.fill_cache {
            self.cache.insert(cache_key, Arc::clone(&block), block.charge());
        }
        Ok(block)
    }

    /// The entry at or after `target`, as a block and position.
    fn seek_entry(
        &self,
        target: &InternalKey,
        ctx: ReadContext,
    ) -> CoreResult<Option<(Arc<Block>, usize)>> {
        let index = self.index.partition_point(|entry| entry.last_key < *target);
        if index == self.index.len() {
            return Ok(None);
        }
        let block = self.read_block(index, ctx)?;
        let position = block.seek(target);
        if position >= block.len() {
            return Err(CoreError::corruption(format!(
                "table {:06}: index disagrees with block contents",
                self.number
            )));
        }
        Ok(Some((block, position)))
    }

    /// Newest version of `key` with a sequence at or below `sequence`.
    pub(crate) fn get(
        &self,
        key: &[u8],
        sequence: SequenceNumber,
        ctx: ReadContext,
    ) -> CoreResult<Option<Versioned>> {
        let target = InternalKey::seek(key, sequence);
        let Some((block, position)) = self.seek_entry(&target, ctx)? else {
            return Ok(None);
        };
        Ok(block
            .entry(position)
            .filter(|(found, _)| found.user_key() == key)
            .map(|(found, value)| Versioned::from_entry(found, value)))
    }

    /// User key of the first entry at or after `target`.
    pub(crate) fn first_key_at_or_after(
        &self,
        target: &InternalKey,
        ctx: ReadContext,
    ) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.seek_entry(target, ctx)?.and_then(|(block, position)| {
            block
                .entry(position)
                .map(|(key, _)| key.user_key().to_vec())
        }))
    }

    /// Largest user key strictly below `bound`, or the largest key overall.
    pub(crate) fn last_key_before(
        &self,
        bound: Option<&[u8]>,
        ctx: ReadContext,
    ) -> CoreResult<Option<Vec<u8>>> {
        let Some(bound) = bound else {
            return Ok(self.largest_user_key().map(<[u8]>::to_vec));
        };
        let target = InternalKey::seek(bound, MAX_SEQUENCE);
        let index = self.index.partition_point(|entry| entry.last_key < target);
        if index < self.index.len() {
            let block = self.read_block(index, ctx)?;
            if let Some(key) = block.last_key_before(&target) {
                return Ok(Some(key.to_vec()));
            }
        }
        Ok(index
            .checked_sub(1)
            .map(|previous| self.index[previous].last_key.user_key().to_vec()))
    }

    /// Every entry in order, read without filling the cache.
    pub(crate) fn entries(&self) -> TableEntries<'_> {
        TableEntries {
            table: self,
            block_index: 0,
            block: None,
            position: 0,
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        self.cache.erase_table(self.cache_id);
        if !self.obsolete.load(Ordering::Acquire) {
            return;
        }
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(table = self.number, "deleted obsolete table"),
                Err(err) => tracing::warn!(
                    table = self.number,
                    error = %err,
                    "failed to delete obsolete table"
                ),
            }
        }
    }
}

/// Sequential scan over a table.
pub(crate) struct TableEntries<'a> {
    table: &'a Table,
    block_index: usize,
    block: Option<Arc<Block>>,
    position: usize,
}

impl Iterator for TableEntries<'_> {
    type Item = CoreResult<(InternalKey, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(block) = &self.block {
                if let Some((key, value)) = block.entry(self.position) {
                    self.position += 1;
                    return Some(Ok((key.clone(), value.clone())));
                }
                self.block = None;
            }
            if self.block_index >= self.table.index.len() {
                return None;
            }
            match self
                .table
                .read_block(self.block_index, ReadContext::background())
            {
                Ok(block) => {
                    self.block = Some(block);
                    self.block_index += 1;
                    self.position = 0;
                }
                Err(err) => {
                    self.block_index = self.table.index.len();
                    return Some(Err(err));
                }
            }
        }
    }
}

fn truncated(number: u64, err: StorageError) -> CoreError {
    match err {
        StorageError::ReadPastEnd { .. } => {
            CoreError::corruption(format!("table {number:06}: truncated ({err})"))
        }
        other => CoreError::Storage(other),
    }
}

fn annotate(number: u64, err: CoreError) -> CoreError {
    match err {
        CoreError::Corruption { message } => {
            CoreError::corruption(format!("table {number:06}: {message}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableBuilder;
    use crate::types::ValueKind;
    use levelkv_storage::InMemoryBackend;

    fn build_table(entries: &[(&str, u64, ValueKind, &str)], block_size: usize) -> Table {
        build_table_in(Arc::new(BlockCache::new(1 << 20)), entries, block_size)
    }

    fn build_table_in(
        cache: Arc<BlockCache>,
        entries: &[(&str, u64, ValueKind, &str)],
        block_size: usize,
    ) -> Table {
        let mut builder = TableBuilder::new(Box::new(InMemoryBackend::new()), block_size);
        for (key, seq, kind, value) in entries {
            builder
                .add(&InternalKey::new(key.as_bytes(), *seq, *kind), value.as_bytes())
                .unwrap();
        }
        let (backend, _) = builder.finish().unwrap();
        Table::open(7, backend, None, cache).unwrap()
    }

    fn many() -> Table {
        let entries: Vec<(String, u64)> = (0..200).map(|i| (format!("k{i:04}"), i + 1)).collect();
        let rows: Vec<(&str, u64, ValueKind, &str)> = entries
            .iter()
            .map(|(k, s)| (k.as_str(), *s, ValueKind::Value, "v"))
            .collect();
        build_table(&rows, 128)
    }

    const CTX: ReadContext = ReadContext {
        verify_checksums: true,
        fill_cache: true,
    };

    #[test]
    fn open_reports_metadata() {
        let table = many();
        assert_eq!(table.number(), 7);
        assert_eq!(table.entry_count(), 200);
        assert_eq!(table.max_sequence(), 200);
        assert_eq!(table.smallest_user_key(), Some(&b"k0000"[..]));
        assert_eq!(table.largest_user_key(), Some(&b"k0199"[..]));
        assert!(table.index.len() > 1);
    }

    #[test]
    fn get_finds_visible_versions() {
        let table = build_table(
            &[
                ("a", 9, ValueKind::Deletion, ""),
                ("a", 4, ValueKind::Value, "old"),
                ("b", 2, ValueKind::Value, "b"),
            ],
            4096,
        );
        assert!(table.get(b"a", 10, CTX).unwrap().unwrap().value.is_none());
        assert_eq!(
            table.get(b"a", 8, CTX).unwrap().unwrap().value.as_deref(),
            Some(&b"old"[..])
        );
        assert!(table.get(b"a", 3, CTX).unwrap().is_none());
        assert!(table.get(b"c", 10, CTX).unwrap().is_none());
    }

    #[test]
    fn positioning_across_blocks() {
        let table = many();
        assert_eq!(
            table
                .first_key_at_or_after(&InternalKey::seek(b"k0100x", MAX_SEQUENCE), CTX)
                .unwrap(),
            Some(b"k0101".to_vec())
        );
        assert!(table
            .first_key_at_or_after(&InternalKey::seek(b"z", MAX_SEQUENCE), CTX)
            .unwrap()
            .is_none());
        assert_eq!(
            table.last_key_before(Some(b"k0100"), CTX).unwrap(),
            Some(b"k0099".to_vec())
        );
        assert_eq!(
            table.last_key_before(Some(b"zzz"), CTX).unwrap(),
            Some(b"k0199".to_vec())
        );
        assert!(table.last_key_before(Some(b"k0000"), CTX).unwrap().is_none());
        assert_eq!(table.last_key_before(None, CTX).unwrap(), Some(b"k0199".to_vec()));
    }

    #[test]
    fn reads_fill_cache_on_request() {
        let table = many();
        table.get(b"k0050", 1000, ReadContext::background()).unwrap();
        assert_eq!(table.cache.len(), 0);
        table.get(b"k0050", 1000, CTX).unwrap();
        assert_eq!(table.cache.len(), 1);
        table.get(b"k0050", 1000, CTX).unwrap();
        assert!(table.cache.hits() >= 1);
    }

    #[test]
    fn same_file_number_in_a_shared_cache() {
        let cache = Arc::new(BlockCache::new(1 << 20));
        let a = build_table_in(Arc::clone(&cache), &[("k", 1, ValueKind::Value, "from-a")], 4096);
        let b = build_table_in(Arc::clone(&cache), &[("k", 1, ValueKind::Value, "from-b")], 4096);
        assert_eq!(a.number(), b.number());

        let read = |table: &Table| table.get(b"k", 10, CTX).unwrap().unwrap().value;
        assert_eq!(read(&a).as_deref(), Some(&b"from-a"[..]));
        assert_eq!(read(&b).as_deref(), Some(&b"from-b"[..]));
        assert_eq!(read(&a).as_deref(), Some(&b"from-a"[..]));
        assert_eq!(cache.len(), 2);

        drop(a);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn scan_yields_everything_in_order() {
        let table = many();
        let keys: Vec<Vec<u8>> = table
            .entries()
            .map(|entry| entry.unwrap().0.user_key().to_vec())
            .collect();
        assert_eq!(keys.len(), 200);
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn damaged_files_are_corruption() {
        let cache = Arc::new(BlockCache::new(1024));
        let short = InMemoryBackend::with_data(vec![0; 10]);
        let err = Table::open(1, Box::new(short), None, Arc::clone(&cache)).unwrap_err();
        assert!(err.is_corruption());

        let garbage = InMemoryBackend::with_data(vec![0xAB; 200]);
        let err = Table::open(2, Box::new(garbage), None, cache).unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("000002"));
    }
}
