//! Opaque handle ownership.
//!
//! Each handle is one leaked `Box` of the Rust value behind it. Creating
//! operations leak it with [`into_handle`]; the matching close reclaims it
//! once with [`take_handle`]. Null always means "no resource".

use crate::error::{FfiError, FfiResult};
use crate::iterator::IteratorCursor;
use crate::session::DatabaseSession;
use crate::types::{LevelKvDatabase, LevelKvIterator, LevelKvSnapshot, LevelKvWriteBatch};
use levelkv_core::{Snapshot, WriteBatch};

/// Ties an opaque C type to the Rust value it points at.
pub(crate) trait Opaque {
    type Target;
    /// Used in null-pointer messages.
    const NAME: &'static str;
}

impl Opaque for LevelKvDatabase {
    type Target = DatabaseSession;
    const NAME: &'static str = "database";
}

impl Opaque for LevelKvIterator {
    type Target = IteratorCursor;
    const NAME: &'static str = "iterator";
}

impl Opaque for LevelKvSnapshot {
    type Target = Snapshot;
    const NAME: &'static str = "snapshot";
}

impl Opaque for LevelKvWriteBatch {
    type Target = WriteBatch;
    const NAME: &'static str = "write batch";
}

/// Moves `value` to the heap and returns it as an opaque handle.
pub(crate) fn into_handle<H: Opaque>(value: H::Target) -> *mut H {
    Box::into_raw(Box::new(value)).cast::<H>()
}

/// Borrows the value behind a handle.
///
/// # Safety
///
/// `handle` must be null or a live handle of type `H`.
pub(crate) unsafe fn handle_ref<'a, H: Opaque>(handle: *const H) -> FfiResult<&'a H::Target> {
    handle
        .cast::<H::Target>()
        .as_ref()
        .ok_or(FfiError::NullPointer(H::NAME))
}

/// Mutably borrows the value behind a handle.
///
/// # Safety
///
/// `handle` must be null or a live handle of type `H`, not borrowed elsewhere.
pub(crate) unsafe fn handle_mut<'a, H: Opaque>(handle: *mut H) -> FfiResult<&'a mut H::Target> {
    handle
        .cast::<H::Target>()
        .as_mut()
        .ok_or(FfiError::NullPointer(H::NAME))
}

/// Reclaims the value behind a handle. Returns `None` for null.
///
/// # Safety
///
/// `handle` must be null or a live handle of type `H`; it is dangling
/// afterwards.
pub(crate) unsafe fn take_handle<H: Opaque>(handle: *mut H) -> Option<Box<H::Target>> {
    if handle.is_null() {
        None
    } else {
        Some(Box::from_raw(handle.cast::<H::Target>()))
    }
}

/// Checks that an out-pointer can be written.
pub(crate) fn require_out<T>(out: *mut T, what: &'static str) -> FfiResult<()> {
    if out.is_null() {
        Err(FfiError::NullPointer(what))
    } else {
        Ok(())
    }
}
