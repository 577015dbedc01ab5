//! Ordered iteration over a consistent view of the database.

use crate::error::{CoreError, CoreResult};
use crate::snapshot::Snapshot;
use crate::table::ReadContext;
use crate::types::{successor, SequenceNumber};
use crate::version::Version;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cursor over the live keys of a database, in unsigned byte order.
///
/// The iterator reads the version and sequence that were current when it
/// was created (or those of the snapshot it was given) and pins them, so
/// later writes, flushes and compactions never change what it sees.
///
/// Positioning methods never fail directly: after each call, check
/// [`valid`](Self::valid) and [`status`](Self::status). Once the database is
/// closed every positioning call invalidates the iterator and reports
/// [`CoreError::Closed`].
pub struct DbIterator {
    version: Arc<Version>,
    sequence: SequenceNumber,
    ctx: ReadContext,
    closed: Arc<AtomicBool>,
    _pin: Snapshot,
    current: Option<(Vec<u8>, Vec<u8>)>,
    status: Option<CoreError>,
}

impl fmt::Debug for DbIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbIterator")
            .field("sequence", &self.sequence)
            .field("valid", &self.valid())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl DbIterator {
    pub(crate) fn new(
        version: Arc<Version>,
        pin: Snapshot,
        ctx: ReadContext,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            version,
            sequence: pin.sequence(),
            ctx,
            closed,
            _pin: pin,
            current: None,
            status: None,
        }
    }

    /// Returns true when positioned on an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// The current key, or `None` when not valid.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(key, _)| key.as_slice())
    }

    /// The current value, or `None` when not valid.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, value)| value.as_slice())
    }

    /// The error from the last positioning call, if it failed.
    #[must_use]
    pub fn status(&self) -> Option<&CoreError> {
        self.status.as_ref()
    }

    /// Sequence number of the view being iterated.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Positions at the first key.
    pub fn seek_to_first(&mut self) {
        self.reposition(|version, sequence, ctx| version.first_visible_from(b"", sequence, ctx));
    }

    /// Positions at the last key.
    pub fn seek_to_last(&mut self) {
        self.reposition(|version, sequence, ctx| version.last_visible_before(None, sequence, ctx));
    }

    /// Positions at the first key at or after `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.reposition(|version, sequence, ctx| version.first_visible_from(target, sequence, ctx));
    }

    /// Moves to the next key. Does nothing when not valid.
    pub fn next(&mut self) {
        let Some((key, _)) = self.current.take() else {
            return;
        };
        let start = successor(&key);
        self.reposition(|version, sequence, ctx| version.first_visible_from(&start, sequence, ctx));
    }

    /// Moves to the previous key. Does nothing when not valid.
    pub fn prev(&mut self) {
        let Some((key, _)) = self.current.take() else {
            return;
        };
        self.reposition(|version, sequence, ctx| {
            version.last_visible_before(Some(&key), sequence, ctx)
        });
    }

    fn reposition<F>(&mut self, find: F)
    where
        F: FnOnce(&Version, SequenceNumber, ReadContext) -> CoreResult<Option<(Vec<u8>, Vec<u8>)>>,
    {
        self.current = None;
        self.status = None;
        if self.closed.load(Ordering::Acquire) {
            self.status = Some(CoreError::Closed);
            return;
        }
        match find(&self.version, self.sequence, self.ctx) {
            Ok(found) => self.current = found,
            Err(err) => {
                tracing::warn!(target: "levelkv::iterator", error = %err, "iterator positioning failed");
                self.status = Some(err);
            }
        }
    }
}
