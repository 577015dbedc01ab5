//! Iterator FFI functions.
//!
//! A cursor starts unpositioned. Every positioning call checks the engine
//! iterator's status afterwards; a failure is written to the log sink under
//! `levelkv:iterator` and returned as the call's result.

use crate::buffer::{borrow_bytes, write_buffer, LevelKvBuffer};
use crate::error::{clear_last_error, finish, FfiError, FfiResult, LevelKvResult};
use crate::handle::{handle_mut, handle_ref, require_out, take_handle};
use crate::logging::{emit, ITERATOR_COMPONENT};
use crate::types::LevelKvIterator;
use levelkv_core::DbIterator;

/// The native object behind an iterator handle.
#[derive(Debug)]
pub struct IteratorCursor {
    inner: DbIterator,
}

impl IteratorCursor {
    /// Wraps an engine iterator.
    pub fn new(inner: DbIterator) -> Self {
        Self { inner }
    }

    /// Returns true when positioned on an entry.
    pub fn valid(&self) -> bool {
        self.inner.valid()
    }

    /// Current key, if valid.
    pub fn key(&self) -> Option<&[u8]> {
        self.inner.key()
    }

    /// Current value, if valid.
    pub fn value(&self) -> Option<&[u8]> {
        self.inner.value()
    }

    /// Positions at the first entry.
    pub fn seek_to_first(&mut self) -> FfiResult<()> {
        self.inner.seek_to_first();
        self.check()
    }

    /// Positions at the last entry.
    pub fn seek_to_last(&mut self) -> FfiResult<()> {
        self.inner.seek_to_last();
        self.check()
    }

    /// Positions at the first entry with key at or after `target`.
    pub fn seek(&mut self, target: &[u8]) -> FfiResult<()> {
        self.inner.seek(target);
        self.check()
    }

    /// Advances to the next entry.
    pub fn next(&mut self) -> FfiResult<()> {
        self.require_valid()?;
        self.inner.next();
        self.check()
    }

    /// Moves to the previous entry.
    pub fn prev(&mut self) -> FfiResult<()> {
        self.require_valid()?;
        self.inner.prev();
        self.check()
    }

    /// The accumulated engine status.
    pub fn status(&self) -> FfiResult<()> {
        match self.inner.status() {
            Some(err) => Err(FfiError::status(err)),
            None => Ok(()),
        }
    }

    fn require_valid(&self) -> FfiResult<()> {
        if self.inner.valid() {
            Ok(())
        } else {
            Err(FfiError::InvalidArgument("iterator is not valid".into()))
        }
    }

    fn check(&self) -> FfiResult<()> {
        self.status().inspect_err(|err| emit(ITERATOR_COMPONENT, &err.to_string()))
    }
}

/// Applies `op` to the cursor behind `iter`.
unsafe fn with_cursor(
    iter: *mut LevelKvIterator,
    op: impl FnOnce(&mut IteratorCursor) -> FfiResult<()>,
) -> LevelKvResult {
    clear_last_error();
    finish(handle_mut(iter).and_then(op))
}

/// Copies the key or value the cursor is on into `out`.
unsafe fn copy_current(
    iter: *const LevelKvIterator,
    out: *mut LevelKvBuffer,
    pick: fn(&IteratorCursor) -> Option<&[u8]>,
) -> FfiResult<()> {
    require_out(out, "out_buffer")?;
    let cursor = handle_ref(iter)?;
    write_buffer(out, pick(cursor).map(<[u8]>::to_vec));
    Ok(())
}

/// Positions the iterator at the first key.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_seek_to_first(iter: *mut LevelKvIterator) -> LevelKvResult {
    with_cursor(iter, IteratorCursor::seek_to_first)
}

/// Positions the iterator at the last key.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_seek_to_last(iter: *mut LevelKvIterator) -> LevelKvResult {
    with_cursor(iter, IteratorCursor::seek_to_last)
}

/// Positions the iterator at the first key at or after `key`.
///
/// # Safety
///
/// - `iter` must be null or a live iterator handle
/// - `key` must be null or point to `key_len` readable bytes
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_seek(
    iter: *mut LevelKvIterator,
    key: *const u8,
    key_len: usize,
) -> LevelKvResult {
    with_cursor(iter, |cursor| {
        let target = borrow_bytes(key, key_len, "key")?;
        cursor.seek(target)
    })
}

/// Advances the iterator.
///
/// Returns `InvalidArgument` if the iterator is not valid.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_next(iter: *mut LevelKvIterator) -> LevelKvResult {
    with_cursor(iter, IteratorCursor::next)
}

/// Moves the iterator back one key.
///
/// Returns `InvalidArgument` if the iterator is not valid.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_prev(iter: *mut LevelKvIterator) -> LevelKvResult {
    with_cursor(iter, IteratorCursor::prev)
}

/// Returns true if the iterator is positioned on an entry. Null is never valid.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_valid(iter: *const LevelKvIterator) -> bool {
    handle_ref(iter).is_ok_and(IteratorCursor::valid)
}

/// Copies the current key into `out_buffer`.
///
/// The null buffer is written when the iterator is not valid, and also for
/// an empty key.
///
/// # Safety
///
/// - `iter` must be null or a live iterator handle
/// - `out_buffer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_key(
    iter: *const LevelKvIterator,
    out_buffer: *mut LevelKvBuffer,
) -> LevelKvResult {
    clear_last_error();
    finish(copy_current(iter, out_buffer, IteratorCursor::key))
}

/// Copies the current value into `out_buffer`.
///
/// The null buffer is written when the iterator is not valid, and also for
/// an empty value.
///
/// # Safety
///
/// - `iter` must be null or a live iterator handle
/// - `out_buffer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_value(
    iter: *const LevelKvIterator,
    out_buffer: *mut LevelKvBuffer,
) -> LevelKvResult {
    clear_last_error();
    finish(copy_current(iter, out_buffer, IteratorCursor::value))
}

/// Returns the iterator's accumulated status.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_status(iter: *const LevelKvIterator) -> LevelKvResult {
    clear_last_error();
    finish(handle_ref(iter).and_then(IteratorCursor::status))
}

/// Releases an iterator. Null is a no-op.
///
/// # Safety
///
/// `iter` must be null or a live iterator handle; it is dangling afterwards.
#[no_mangle]
pub unsafe extern "C" fn levelkv_iter_close(iter: *mut LevelKvIterator) {
    drop(take_handle(iter));
}
