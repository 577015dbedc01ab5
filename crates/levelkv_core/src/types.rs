//! Core type definitions for LevelKV.

use crate::coding::{put_slice, put_u64, Decoder};
use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;

/// Monotonic sequence number stamped on every write.
pub type SequenceNumber = u64;

/// Largest sequence number the engine hands out.
///
/// The low byte of a packed internal-key tag holds the [`ValueKind`], so
/// sequences are limited to 56 bits.
pub const MAX_SEQUENCE: SequenceNumber = (1 << 56) - 1;

/// What an internal entry records for its user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// The key was deleted.
    Deletion = 0,
    /// The key was set to a value.
    Value = 1,
}

impl ValueKind {
    /// Converts a byte to a value kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Deletion),
            1 => Some(Self::Value),
            _ => None,
        }
    }

    /// Converts the value kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A user key tagged with the sequence and kind of the write that produced it.
///
/// Ordering is user key ascending, then sequence descending, so the newest
/// version of a key sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct InternalKey {
    user_key: Vec<u8>,
    sequence: SequenceNumber,
    kind: ValueKind,
}

impl InternalKey {
    pub(crate) fn new(user_key: &[u8], sequence: SequenceNumber, kind: ValueKind) -> Self {
        Self {
            user_key: user_key.to_vec(),
            sequence,
            kind,
        }
    }

    /// The smallest internal key for `user_key` that is visible at `sequence`.
    pub(crate) fn seek(user_key: &[u8], sequence: SequenceNumber) -> Self {
        Self::new(user_key, sequence, ValueKind::Value)
    }

    pub(crate) fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    pub(crate) fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub(crate) fn kind(&self) -> ValueKind {
        self.kind
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        put_slice(buf, &self.user_key);
        put_u64(buf, (self.sequence << 8) | u64::from(self.kind.as_byte()));
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>) -> CoreResult<Self> {
        let user_key = dec.slice()?.to_vec();
        let tag = dec.u64()?;
        let kind = ValueKind::from_byte((tag & 0xFF) as u8)
            .ok_or_else(|| CoreError::corruption(format!("unknown value kind {}", tag & 0xFF)))?;
        Ok(Self {
            user_key,
            sequence: tag >> 8,
            kind,
        })
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.kind.cmp(&self.kind))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The newest version of a key visible at some sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Versioned {
    pub(crate) sequence: SequenceNumber,
    /// `None` for a deletion.
    pub(crate) value: Option<Vec<u8>>,
}

impl Versioned {
    pub(crate) fn from_entry(key: &InternalKey, value: &[u8]) -> Self {
        Self {
            sequence: key.sequence(),
            value: match key.kind() {
                ValueKind::Value => Some(value.to_vec()),
                ValueKind::Deletion => None,
            },
        }
    }
}

/// The smallest key strictly greater than `key`.
pub(crate) fn successor(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_kind_roundtrip() {
        for kind in [ValueKind::Deletion, ValueKind::Value] {
            assert_eq!(ValueKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(ValueKind::from_byte(9), None);
    }

    #[test]
    fn newer_versions_sort_first() {
        let old = InternalKey::new(b"a", 3, ValueKind::Value);
        let new = InternalKey::new(b"a", 7, ValueKind::Deletion);
        let other = InternalKey::new(b"b", 1, ValueKind::Value);
        assert!(new < old);
        assert!(old < other);
        assert!(InternalKey::seek(b"a", 7) <= new);
        assert!(InternalKey::seek(b"a", 6) > new);
        assert!(InternalKey::seek(b"a", 6) < old);
    }

    #[test]
    fn keys_compare_as_unsigned_bytes() {
        let low = InternalKey::new(&[0x01], 1, ValueKind::Value);
        let high = InternalKey::new(&[0xFF], 1, ValueKind::Value);
        let longer = InternalKey::new(&[0x01, 0x00], 1, ValueKind::Value);
        assert!(low < high);
        assert!(low < longer);
        assert!(longer < high);
    }

    #[test]
    fn encoding_preserves_fields() {
        let key = InternalKey::new(b"user", MAX_SEQUENCE, ValueKind::Deletion);
        let mut buf = Vec::new();
        key.encode_into(&mut buf);
        assert_eq!(buf.len(), 4 + b"user".len() + 8);

        let mut dec = Decoder::new(&buf, "key");
        assert_eq!(InternalKey::decode(&mut dec).unwrap(), key);
    }

    #[test]
    fn successor_is_next_key() {
        assert_eq!(successor(b"ab"), b"ab\0".to_vec());
        assert!(successor(b"ab").as_slice() > b"ab".as_slice());
        assert!(successor(b"ab").as_slice() < b"ab\x01".as_slice());
    }
}
