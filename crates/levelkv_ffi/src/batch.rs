//! Write batch FFI functions.
//!
//! A batch is independent of any database until passed to `levelkv_write`,
//! and may be applied any number of times.

use crate::buffer::borrow_bytes;
use crate::error::{clear_last_error, finish, FfiResult, LevelKvResult};
use crate::handle::{handle_mut, handle_ref, into_handle, require_out, take_handle};
use crate::types::LevelKvWriteBatch;
use levelkv_core::WriteBatch;

/// Creates an empty write batch.
///
/// # Safety
///
/// `out_batch` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn levelkv_batch_create(out_batch: *mut *mut LevelKvWriteBatch) -> LevelKvResult {
    clear_last_error();
    finish(require_out(out_batch, "out_batch").map(|()| {
        *out_batch = into_handle::<LevelKvWriteBatch>(WriteBatch::new());
    }))
}

/// Appends a put of `key` → `value`.
///
/// # Safety
///
/// - `batch` must be null or a live batch handle
/// - `key` and `value` must be null or point to the given number of bytes
#[no_mangle]
pub unsafe extern "C" fn levelkv_batch_put(
    batch: *mut LevelKvWriteBatch,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> LevelKvResult {
    clear_last_error();
    finish(append_put(batch, key, key_len, value, value_len))
}

/// Appends a delete of `key`.
///
/// # Safety
///
/// - `batch` must be null or a live batch handle
/// - `key` must be null or point to `key_len` bytes
#[no_mangle]
pub unsafe extern "C" fn levelkv_batch_delete(
    batch: *mut LevelKvWriteBatch,
    key: *const u8,
    key_len: usize,
) -> LevelKvResult {
    clear_last_error();
    finish(append_delete(batch, key, key_len))
}

unsafe fn append_put(
    batch: *mut LevelKvWriteBatch,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> FfiResult<()> {
    let batch = handle_mut(batch)?;
    let key = borrow_bytes(key, key_len, "key")?;
    let value = borrow_bytes(value, value_len, "value")?;
    batch.put(key, value);
    Ok(())
}

unsafe fn append_delete(batch: *mut LevelKvWriteBatch, key: *const u8, key_len: usize) -> FfiResult<()> {
    let batch = handle_mut(batch)?;
    batch.delete(borrow_bytes(key, key_len, "key")?);
    Ok(())
}

/// Removes every operation from the batch.
///
/// # Safety
///
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_batch_clear(batch: *mut LevelKvWriteBatch) -> LevelKvResult {
    clear_last_error();
    finish(handle_mut(batch).map(WriteBatch::clear))
}

/// Number of operations in the batch; 0 for null.
///
/// # Safety
///
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn levelkv_batch_count(batch: *const LevelKvWriteBatch) -> u32 {
    handle_ref(batch).map_or(0, WriteBatch::count)
}

/// Releases a batch. Null is a no-op.
///
/// # Safety
///
/// `batch` must be null or a live batch handle; it is dangling afterwards.
#[no_mangle]
pub unsafe extern "C" fn levelkv_batch_close(batch: *mut LevelKvWriteBatch) {
    drop(take_handle(batch));
}
