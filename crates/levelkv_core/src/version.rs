//! Immutable view of the current memtable and tables.
//!
//! Readers clone an `Arc<Version>` under a short read lock and then read
//! without further locking. The writer publishes a new version after each
//! flush or compaction.

use crate::error::CoreResult;
use crate::memtable::MemTable;
use crate::table::{ReadContext, Table};
use crate::types::{successor, InternalKey, SequenceNumber, Versioned};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Version {
    pub(crate) mem: Arc<MemTable>,
    /// Newest first.
    pub(crate) tables: Vec<Arc<Table>>,
}

impl Version {
    pub(crate) fn new(mem: Arc<MemTable>, tables: Vec<Arc<Table>>) -> Self {
        Self { mem, tables }
    }

    /// Newest version of `key` visible at `sequence`, across every source.
    pub(crate) fn get(
        &self,
        key: &[u8],
        sequence: SequenceNumber,
        ctx: ReadContext,
    ) -> CoreResult<Option<Versioned>> {
        let mut best = self.mem.get(key, sequence);
        for table in &self.tables {
            if best
                .as_ref()
                .is_some_and(|found| table.max_sequence() < found.sequence)
            {
                continue;
            }
            if let Some(found) = table.get(key, sequence, ctx)? {
                if best.as_ref().map_or(true, |b| found.sequence > b.sequence) {
                    best = Some(found);
                }
            }
        }
        Ok(best)
    }

    /// First live key at or after `start` visible at `sequence`.
    pub(crate) fn first_visible_from(
        &self,
        start: &[u8],
        sequence: SequenceNumber,
        ctx: ReadContext,
    ) -> CoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let mut cursor = start.to_vec();
        loop {
            let target = InternalKey::seek(&cursor, sequence);
            let mut candidate = self.mem.first_key_at_or_after(&target);
            for table in &self.tables {
                if let Some(key) = table.first_key_at_or_after(&target, ctx)? {
                    if candidate.as_ref().map_or(true, |c| key < *c) {
                        candidate = Some(key);
                    }
                }
            }
            let Some(key) = candidate else {
                return Ok(None);
            };
            if let Some(Versioned {
                value: Some(value), ..
            }) = self.get(&key, sequence, ctx)?
            {
                return Ok(Some((key, value)));
            }
            cursor = successor(&key);
        }
    }

    /// Last live key strictly below `bound` (or overall) visible at `sequence`.
    pub(crate) fn last_visible_before(
        &self,
        bound: Option<&[u8]>,
        sequence: SequenceNumber,
        ctx: ReadContext,
    ) -> CoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let mut bound = bound.map(<[u8]>::to_vec);
        loop {
            let mut candidate = self.mem.last_key_before(bound.as_deref());
            for table in &self.tables {
                if let Some(key) = table.last_key_before(bound.as_deref(), ctx)? {
                    if candidate.as_ref().map_or(true, |c| key > *c) {
                        candidate = Some(key);
                    }
                }
            }
            let Some(key) = candidate else {
                return Ok(None);
            };
            if let Some(Versioned {
                value: Some(value), ..
            }) = self.get(&key, sequence, ctx)?
            {
                return Ok(Some((key, value)));
            }
            bound = Some(key);
        }
    }

    pub(crate) fn table_bytes(&self) -> u64 {
        self.tables.iter().map(|table| table.file_size()).sum()
    }
}
