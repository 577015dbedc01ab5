//! Table merging and garbage collection.
//!
//! Compaction merges every live table into one. For each user key it keeps
//! the newest version plus every older version some live snapshot can still
//! see; everything else is dropped.
//!
//! ## Invariants
//!
//! - Compaction never changes what any live snapshot or the latest state reads
//! - A deletion marker is dropped once no snapshot predates it, since no
//!   older table remains for it to shadow
//! - The output holds each internal key at most once

use crate::cache::BlockCache;
use crate::dir::DatabaseDir;
use crate::error::CoreResult;
use crate::table::{Table, TableBuilder, TableSummary};
use crate::types::{InternalKey, SequenceNumber, ValueKind};
use levelkv_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

/// An internal entry as produced by a table scan or memtable.
pub(crate) type Entry = (InternalKey, Vec<u8>);

/// Boxed source of entries in internal-key order.
pub(crate) type EntrySource<'a> = Box<dyn Iterator<Item = CoreResult<Entry>> + 'a>;

/// Counts from one compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CompactionResult {
    pub(crate) input_entries: u64,
    pub(crate) output_entries: u64,
    pub(crate) obsolete_versions_removed: u64,
    pub(crate) tombstones_removed: u64,
}

struct HeapItem {
    key: InternalKey,
    value: Vec<u8>,
    source: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

/// K-way merge of sorted entry sources.
pub(crate) struct MergingIter<'a> {
    sources: Vec<EntrySource<'a>>,
    heap: BinaryHeap<Reverse<HeapItem>>,
    started: bool,
    failed: bool,
}

impl<'a> MergingIter<'a> {
    pub(crate) fn new(sources: Vec<EntrySource<'a>>) -> Self {
        Self {
            sources,
            heap: BinaryHeap::new(),
            started: false,
            failed: false,
        }
    }

    fn pull(&mut self, source: usize) -> CoreResult<()> {
        if let Some(next) = self.sources[source].next() {
            let (key, value) = next?;
            self.heap.push(Reverse(HeapItem { key, value, source }));
        }
        Ok(())
    }

    fn start(&mut self) -> CoreResult<()> {
        self.started = true;
        for source in 0..self.sources.len() {
            self.pull(source)?;
        }
        Ok(())
    }
}

impl Iterator for MergingIter<'_> {
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if !self.started {
            if let Err(err) = self.start() {
                self.failed = true;
                return Some(Err(err));
            }
        }
        let Reverse(item) = self.heap.pop()?;
        if let Err(err) = self.pull(item.source) {
            self.failed = true;
            return Some(Err(err));
        }
        Some(Ok((item.key, item.value)))
    }
}

/// Drops entries no reader at or after `oldest_snapshot` can see.
pub(crate) struct CompactionFilter<I> {
    inner: I,
    oldest_snapshot: SequenceNumber,
    current_key: Option<Vec<u8>>,
    last_sequence_for_key: SequenceNumber,
    result: CompactionResult,
}

impl<I> CompactionFilter<I> {
    pub(crate) fn new(inner: I, oldest_snapshot: SequenceNumber) -> Self {
        Self {
            inner,
            oldest_snapshot,
            current_key: None,
            last_sequence_for_key: SequenceNumber::MAX,
            result: CompactionResult::default(),
        }
    }

    pub(crate) fn result(&self) -> CompactionResult {
        self.result
    }
}

impl<I> Iterator for CompactionFilter<I>
where
    I: Iterator<Item = CoreResult<Entry>>,
{
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            self.result.input_entries += 1;

            if self.current_key.as_deref() != Some(key.user_key()) {
                self.current_key = Some(key.user_key().to_vec());
                self.last_sequence_for_key = SequenceNumber::MAX;
            }

            let drop = if self.last_sequence_for_key == key.sequence() {
                true
            } else if self.last_sequence_for_key <= self.oldest_snapshot {
                self.result.obsolete_versions_removed += 1;
                true
            } else if key.kind() == ValueKind::Deletion && key.sequence() <= self.oldest_snapshot {
                self.result.tombstones_removed += 1;
                true
            } else {
                false
            };
            self.last_sequence_for_key = key.sequence();

            if !drop {
                self.result.output_entries += 1;
                return Some(Ok((key, value)));
            }
        }
    }
}

/// Writes `entries` into table `number`.
///
/// On disk when `dir` is given, in memory otherwise. Returns `None`, and
/// leaves no file behind, when there was nothing to write.
pub(crate) fn write_table<I>(
    dir: Option<&DatabaseDir>,
    number: u64,
    block_size: usize,
    cache: &Arc<BlockCache>,
    entries: I,
) -> CoreResult<Option<(Arc<Table>, TableSummary)>>
where
    I: Iterator<Item = CoreResult<Entry>>,
{
    let path = dir.map(|dir| dir.table_path(number));
    let backend: Box<dyn StorageBackend> = match &path {
        Some(path) => Box::new(FileBackend::create(path)?),
        None => Box::new(InMemoryBackend::new()),
    };

    let built = fill_table(TableBuilder::new(backend, block_size), entries);

    let finished = match built {
        Ok(Some(finished)) => finished,
        Ok(None) => {
            remove_partial(path.as_deref());
            return Ok(None);
        }
        Err(err) => {
            remove_partial(path.as_deref());
            return Err(err);
        }
    };

    let (backend, summary) = finished;
    let table = Table::open(number, backend, path, Arc::clone(cache))?;
    tracing::debug!(
        table = number,
        entries = summary.entry_count,
        bytes = summary.file_size,
        "wrote table"
    );
    Ok(Some((Arc::new(table), summary)))
}

fn fill_table<I>(
    mut builder: TableBuilder,
    entries: I,
) -> CoreResult<Option<(Box<dyn StorageBackend>, TableSummary)>>
where
    I: Iterator<Item = CoreResult<Entry>>,
{
    for entry in entries {
        let (key, value) = entry?;
        builder.add(&key, &value)?;
    }
    if builder.entry_count() == 0 {
        return Ok(None);
    }
    builder.finish().map(Some)
}

fn remove_partial(path: Option<&std::path::Path>) {
    if let Some(path) = path {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove partial table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn entry(key: &str, sequence: u64, kind: ValueKind) -> CoreResult<Entry> {
        Ok((
            InternalKey::new(key.as_bytes(), sequence, kind),
            format!("{key}@{sequence}").into_bytes(),
        ))
    }

    fn source(entries: Vec<CoreResult<Entry>>) -> EntrySource<'static> {
        Box::new(entries.into_iter())
    }

    fn keys<I: Iterator<Item = CoreResult<Entry>>>(iter: I) -> Vec<(String, u64)> {
        iter.map(|e| {
            let (key, _) = e.unwrap();
            (String::from_utf8(key.user_key().to_vec()).unwrap(), key.sequence())
        })
        .collect()
    }

    #[test]
    fn merge_interleaves_sources() {
        let merged = MergingIter::new(vec![
            source(vec![entry("a", 5, ValueKind::Value), entry("c", 1, ValueKind::Value)]),
            source(vec![entry("a", 2, ValueKind::Value), entry("b", 9, ValueKind::Value)]),
            source(Vec::new()),
        ]);
        assert_eq!(
            keys(merged),
            vec![
                ("a".into(), 5),
                ("a".into(), 2),
                ("b".into(), 9),
                ("c".into(), 1)
            ]
        );
    }

    #[test]
    fn merge_stops_at_first_error() {
        let mut merged = MergingIter::new(vec![
            source(vec![entry("a", 1, ValueKind::Value)]),
            source(vec![Err(CoreError::corruption("bad block"))]),
        ]);
        assert!(merged.next().unwrap().is_err());
        assert!(merged.next().is_none());
    }

    #[test]
    fn filter_without_snapshots_keeps_only_latest_live() {
        let input = vec![
            entry("a", 9, ValueKind::Value),
            entry("a", 4, ValueKind::Value),
            entry("b", 8, ValueKind::Deletion),
            entry("b", 3, ValueKind::Value),
            entry("c", 2, ValueKind::Value),
        ];
        let mut filter = CompactionFilter::new(input.into_iter(), 10);
        assert_eq!(
            keys(filter.by_ref()),
            vec![("a".into(), 9), ("c".into(), 2)]
        );
        let result = filter.result();
        assert_eq!(result.input_entries, 5);
        assert_eq!(result.output_entries, 2);
        assert_eq!(result.obsolete_versions_removed, 2);
        assert_eq!(result.tombstones_removed, 1);
    }

    #[test]
    fn filter_keeps_versions_visible_to_snapshot() {
        let input = vec![
            entry("a", 9, ValueKind::Value),
            entry("a", 4, ValueKind::Value),
            entry("a", 2, ValueKind::Value),
            entry("b", 8, ValueKind::Deletion),
            entry("b", 3, ValueKind::Value),
        ];
        let filter = CompactionFilter::new(input.into_iter(), 5);
        assert_eq!(
            keys(filter),
            vec![
                ("a".into(), 9),
                ("a".into(), 4),
                ("b".into(), 8),
                ("b".into(), 3)
            ]
        );
    }

    #[test]
    fn filter_drops_duplicate_internal_keys() {
        let input = vec![
            entry("a", 7, ValueKind::Value),
            entry("a", 7, ValueKind::Value),
        ];
        let filter = CompactionFilter::new(input.into_iter(), 0);
        assert_eq!(keys(filter), vec![("a".into(), 7)]);
    }

    #[test]
    fn write_table_in_memory() {
        let cache = Arc::new(BlockCache::new(1024));
        let entries = vec![entry("a", 1, ValueKind::Value), entry("b", 2, ValueKind::Value)];
        let (table, summary) = write_table(None, 3, 4096, &cache, entries.into_iter())
            .unwrap()
            .unwrap();
        assert_eq!(table.number(), 3);
        assert_eq!(summary.entry_count, 2);

        assert!(write_table(None, 4, 4096, &cache, std::iter::empty())
            .unwrap()
            .is_none());
    }

    #[test]
    fn write_table_on_disk_cleans_up_empty_output() {
        let temp = tempfile::tempdir().unwrap();
        let dir = DatabaseDir::open(temp.path(), true).unwrap();
        let cache = Arc::new(BlockCache::new(1024));

        assert!(write_table(Some(&dir), 5, 4096, &cache, std::iter::empty())
            .unwrap()
            .is_none());
        assert!(!dir.table_path(5).exists());

        let entries = vec![entry("k", 1, ValueKind::Value)];
        write_table(Some(&dir), 6, 4096, &cache, entries.into_iter())
            .unwrap()
            .unwrap();
        assert!(dir.table_path(6).exists());
    }
}
