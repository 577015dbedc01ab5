//! Atomic write batches.
//!
//! A [`WriteBatch`] keeps its operations in the exact byte form that is
//! appended to the log:
//!
//! ```text
//! | sequence (8) | count (4) | (kind (1) | key_len (4) | key | [value_len (4) | value])* |
//! ```
//!
//! The sequence is stamped by the database when the batch is written.

use crate::coding::{put_slice, u32_at, u64_at, Decoder};
use crate::error::{CoreError, CoreResult};
use crate::memtable::MemTable;
use crate::types::{SequenceNumber, ValueKind};

const HEADER_SIZE: usize = 12;

/// One operation recorded in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp<'a> {
    /// Set `key` to `value`.
    Put {
        /// The key.
        key: &'a [u8],
        /// The value.
        value: &'a [u8],
    },
    /// Remove `key`.
    Delete {
        /// The key.
        key: &'a [u8],
    },
}

impl<'a> BatchOp<'a> {
    /// The key this operation touches.
    #[must_use]
    pub fn key(&self) -> &'a [u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered list of puts and deletes applied atomically by
/// [`Db::write`](crate::Db::write).
///
/// Later operations on the same key win. A batch is independent of any
/// database and can be written any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    rep: Vec<u8>,
    oversized: bool,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self {
            rep: vec![0; HEADER_SIZE],
            oversized: false,
        }
    }
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a put of `key` = `value`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        if !Self::fits(key) || !Self::fits(value) {
            self.oversized = true;
            return;
        }
        self.rep.push(ValueKind::Value.as_byte());
        put_slice(&mut self.rep, key);
        put_slice(&mut self.rep, value);
        self.bump_count();
    }

    /// Appends a delete of `key`.
    pub fn delete(&mut self, key: &[u8]) {
        if !Self::fits(key) {
            self.oversized = true;
            return;
        }
        self.rep.push(ValueKind::Deletion.as_byte());
        put_slice(&mut self.rep, key);
        self.bump_count();
    }

    /// Removes every operation.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(HEADER_SIZE, 0);
        self.oversized = false;
    }

    /// Appends every operation of `other`, in order.
    pub fn append(&mut self, other: &WriteBatch) {
        self.rep.extend_from_slice(&other.rep[HEADER_SIZE..]);
        self.set_count(self.count() + other.count());
        self.oversized |= other.oversized;
    }

    /// Number of operations in the batch.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32_at(&self.rep, 8).unwrap_or(0)
    }

    /// Returns true if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Size of the encoded batch in bytes.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.rep.len()
    }

    /// Iterates the operations in insertion order.
    pub fn iter(&self) -> BatchIter<'_> {
        BatchIter {
            dec: Decoder::new(&self.rep[HEADER_SIZE..], "write batch"),
            remaining: self.count(),
        }
    }

    fn fits(data: &[u8]) -> bool {
        u32::try_from(data.len()).is_ok()
    }

    fn bump_count(&mut self) {
        self.set_count(self.count() + 1);
    }

    fn set_count(&mut self, count: u32) {
        self.rep[8..12].copy_from_slice(&count.to_le_bytes());
    }

    pub(crate) fn sequence(&self) -> SequenceNumber {
        u64_at(&self.rep, 0).unwrap_or(0)
    }

    pub(crate) fn set_sequence(&mut self, sequence: SequenceNumber) {
        self.rep[..8].copy_from_slice(&sequence.to_le_bytes());
    }

    /// Rejects batches holding a key or value too large to encode.
    pub(crate) fn validate_for_write(&self) -> CoreResult<()> {
        if self.oversized {
            return Err(CoreError::invalid_argument(
                "write batch holds a key or value larger than 4 GiB",
            ));
        }
        Ok(())
    }

    pub(crate) fn contents(&self) -> &[u8] {
        &self.rep
    }

    /// Rebuilds a batch from a log record, checking its structure.
    pub(crate) fn from_contents(rep: Vec<u8>) -> CoreResult<Self> {
        if rep.len() < HEADER_SIZE {
            return Err(CoreError::corruption(format!(
                "write batch: {} bytes is smaller than the header",
                rep.len()
            )));
        }
        let batch = Self {
            rep,
            oversized: false,
        };
        let mut seen = 0u32;
        let mut iter = batch.iter();
        for op in &mut iter {
            op?;
            seen += 1;
        }
        if seen != batch.count() || !iter.dec.is_empty() {
            return Err(CoreError::corruption(format!(
                "write batch: header counts {} operations, found {seen}",
                batch.count()
            )));
        }
        Ok(batch)
    }

    /// Inserts every operation into `mem`, numbering them from the batch
    /// sequence. Returns the last sequence used.
    pub(crate) fn insert_into(&self, mem: &MemTable) -> CoreResult<SequenceNumber> {
        let mut sequence = self.sequence();
        for op in self.iter() {
            match op? {
                BatchOp::Put { key, value } => mem.add(sequence, ValueKind::Value, key, value),
                BatchOp::Delete { key } => mem.add(sequence, ValueKind::Deletion, key, &[]),
            }
            sequence += 1;
        }
        Ok(sequence.saturating_sub(1))
    }
}

/// Iterator over the operations of a [`WriteBatch`].
pub struct BatchIter<'a> {
    dec: Decoder<'a>,
    remaining: u32,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = CoreResult<BatchOp<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let op = self.read_op();
        if op.is_err() {
            self.remaining = 0;
        }
        Some(op)
    }
}

impl<'a> BatchIter<'a> {
    fn read_op(&mut self) -> CoreResult<BatchOp<'a>> {
        let kind = self.dec.u8()?;
        match ValueKind::from_byte(kind) {
            Some(ValueKind::Value) => {
                let key = self.dec.slice()?;
                let value = self.dec.slice()?;
                Ok(BatchOp::Put { key, value })
            }
            Some(ValueKind::Deletion) => Ok(BatchOp::Delete {
                key: self.dec.slice()?,
            }),
            None => Err(CoreError::corruption(format!(
                "write batch: unknown operation tag {kind}"
            ))),
        }
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = CoreResult<BatchOp<'a>>;
    type IntoIter = BatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
