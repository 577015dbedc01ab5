//! Database FFI functions.
//!
//! Every function clears the last error on entry and returns a
//! [`LevelKvResult`]. Borrowed inputs are released and temporaries dropped
//! before the result is returned.

use crate::buffer::{borrow_bytes, borrow_path, borrow_str, write_buffer, LevelKvBuffer, LevelKvString};
use crate::error::{clear_last_error, finish, FfiResult, LevelKvResult};
use crate::handle::{handle_ref, into_handle, require_out, take_handle};
use crate::iterator::IteratorCursor;
use crate::logging::HostLogger;
use crate::session::DatabaseSession;
use crate::types::{
    LevelKvDatabase, LevelKvIterator, LevelKvOpenOptions, LevelKvSnapshot, LevelKvWriteBatch,
};
use levelkv_core::{Db, Options, ReadOptions, WriteOptions};
use std::ffi::c_char;
use std::path::Path;
use std::sync::Arc;

/// Opens (or creates) the database in directory `path`.
///
/// Zero sizes select the engine defaults; a block cache is attached only
/// when `cache_size > 0`. A path already open in another session fails
/// with `IoError`.
///
/// # Safety
///
/// - `path` must be a valid null-terminated UTF-8 string
/// - `out_db` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_open(
    path: *const c_char,
    create_if_missing: bool,
    cache_size: usize,
    block_size: usize,
    write_buffer_size: usize,
    out_db: *mut *mut LevelKvDatabase,
) -> LevelKvResult {
    clear_last_error();
    let options = LevelKvOpenOptions {
        create_if_missing,
        cache_size,
        block_size,
        write_buffer_size,
        ..LevelKvOpenOptions::default()
    };
    finish(open(Some(path), &options, out_db))
}

/// Opens a database with extended options.
///
/// A null `path` opens an in-memory database; a null `options` uses the
/// defaults.
///
/// # Safety
///
/// - `path` must be null or a valid null-terminated UTF-8 string
/// - `options` must be null or point to a valid `LevelKvOpenOptions`
/// - `out_db` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_open_with_options(
    path: *const c_char,
    options: *const LevelKvOpenOptions,
    out_db: *mut *mut LevelKvDatabase,
) -> LevelKvResult {
    clear_last_error();
    let options = options.as_ref().copied().unwrap_or_default();
    let path = (!path.is_null()).then_some(path);
    finish(open(path, &options, out_db))
}

unsafe fn open(
    path: Option<*const c_char>,
    options: &LevelKvOpenOptions,
    out_db: *mut *mut LevelKvDatabase,
) -> FfiResult<()> {
    require_out(out_db, "out_db")?;
    let path = path.map(|ptr| borrow_path(ptr)).transpose()?;
    let session = DatabaseSession::open(path, options)?;
    *out_db = into_handle::<LevelKvDatabase>(session);
    Ok(())
}

/// Closes a database. Null is a no-op; closing never fails.
///
/// The database is closed first (syncing the log and releasing the
/// directory lock), then its cache and logger are released. Iterators
/// still open report `Closed` afterwards and must still be closed.
///
/// # Safety
///
/// `db` must be null or a live database handle; it is dangling afterwards.
#[no_mangle]
pub unsafe extern "C" fn levelkv_close(db: *mut LevelKvDatabase) {
    if let Some(session) = take_handle(db) {
        session.close();
    }
}

/// Sets `key` to `value`.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `key` and `value` must be null or point to the given number of bytes
#[no_mangle]
pub unsafe extern "C" fn levelkv_put(
    db: *mut LevelKvDatabase,
    sync: bool,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> LevelKvResult {
    clear_last_error();
    finish(put(db, sync, key, key_len, value, value_len))
}

unsafe fn put(
    db: *mut LevelKvDatabase,
    sync: bool,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> FfiResult<()> {
    let session = handle_ref(db)?;
    let key = borrow_bytes(key, key_len, "key")?;
    let value = borrow_bytes(value, value_len, "value")?;
    session.db().put(&WriteOptions::new(sync), key, value)?;
    Ok(())
}

/// Reads `key` into `out_buffer`.
///
/// An absent key yields the null buffer and `Ok`. An empty value also
/// yields the null buffer: the host cannot tell the two apart.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `key` must be null or point to `key_len` bytes
/// - `snapshot` must be null or a live snapshot handle
/// - `out_buffer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_get(
    db: *mut LevelKvDatabase,
    key: *const u8,
    key_len: usize,
    snapshot: *const LevelKvSnapshot,
    out_buffer: *mut LevelKvBuffer,
) -> LevelKvResult {
    clear_last_error();
    finish(get(db, key, key_len, snapshot, out_buffer))
}

unsafe fn get(
    db: *mut LevelKvDatabase,
    key: *const u8,
    key_len: usize,
    snapshot: *const LevelKvSnapshot,
    out_buffer: *mut LevelKvBuffer,
) -> FfiResult<()> {
    require_out(out_buffer, "out_buffer")?;
    write_buffer(out_buffer, None);
    let session = handle_ref(db)?;
    let key = borrow_bytes(key, key_len, "key")?;
    let value = session.db().get(&read_options(snapshot, true), key)?;
    write_buffer(out_buffer, value);
    Ok(())
}

/// Removes `key`. Removing an absent key is not an error.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `key` must be null or point to `key_len` bytes
#[no_mangle]
pub unsafe extern "C" fn levelkv_delete(
    db: *mut LevelKvDatabase,
    sync: bool,
    key: *const u8,
    key_len: usize,
) -> LevelKvResult {
    clear_last_error();
    finish(delete(db, sync, key, key_len))
}

unsafe fn delete(db: *mut LevelKvDatabase, sync: bool, key: *const u8, key_len: usize) -> FfiResult<()> {
    let session = handle_ref(db)?;
    let key = borrow_bytes(key, key_len, "key")?;
    session.db().delete(&WriteOptions::new(sync), key)?;
    Ok(())
}

/// Applies every operation in `batch` atomically.
///
/// The batch is left unchanged and can be applied again.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `batch` must be null or a live batch handle
#[no_mangle]
pub unsafe extern "C" fn levelkv_write(
    db: *mut LevelKvDatabase,
    sync: bool,
    batch: *const LevelKvWriteBatch,
) -> LevelKvResult {
    clear_last_error();
    finish(write(db, sync, batch))
}

unsafe fn write(db: *mut LevelKvDatabase, sync: bool, batch: *const LevelKvWriteBatch) -> FfiResult<()> {
    let session = handle_ref(db)?;
    let batch = handle_ref(batch)?;
    session.db().write(&WriteOptions::new(sync), batch)?;
    Ok(())
}

/// Answers a diagnostic property into `out_string`.
///
/// Unknown names, and any database-side failure, yield the null string and
/// `Ok`. Known names: `levelkv.num-files-at-level<N>`, `levelkv.stats`,
/// `levelkv.sstables`, `levelkv.approximate-memory-usage`.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `name` must be a valid null-terminated UTF-8 string
/// - `out_string` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_get_property(
    db: *mut LevelKvDatabase,
    name: *const c_char,
    out_string: *mut LevelKvString,
) -> LevelKvResult {
    clear_last_error();
    finish(get_property(db, name, out_string))
}

unsafe fn get_property(
    db: *mut LevelKvDatabase,
    name: *const c_char,
    out_string: *mut LevelKvString,
) -> FfiResult<()> {
    require_out(out_string, "out_string")?;
    *out_string = LevelKvString::empty();
    let session = handle_ref(db)?;
    let name = borrow_str(name, "name")?;
    if let Some(text) = session.db().property(name) {
        *out_string = LevelKvString::from_str(&text).unwrap_or_else(LevelKvString::empty);
    }
    Ok(())
}

/// Creates an iterator over the database, or over `snapshot` when non-null.
///
/// The iterator starts unpositioned. It must be closed with
/// `levelkv_iter_close`, before or after the database is closed.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `snapshot` must be null or a live snapshot handle
/// - `out_iter` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_iterate(
    db: *mut LevelKvDatabase,
    fill_cache: bool,
    snapshot: *const LevelKvSnapshot,
    out_iter: *mut *mut LevelKvIterator,
) -> LevelKvResult {
    clear_last_error();
    finish(iterate(db, fill_cache, snapshot, out_iter))
}

unsafe fn iterate(
    db: *mut LevelKvDatabase,
    fill_cache: bool,
    snapshot: *const LevelKvSnapshot,
    out_iter: *mut *mut LevelKvIterator,
) -> FfiResult<()> {
    require_out(out_iter, "out_iter")?;
    let session = handle_ref(db)?;
    let inner = session.db().iter(&read_options(snapshot, fill_cache))?;
    *out_iter = into_handle::<LevelKvIterator>(IteratorCursor::new(inner));
    Ok(())
}

/// Captures the current state of the database.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `out_snapshot` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn levelkv_snapshot(
    db: *mut LevelKvDatabase,
    out_snapshot: *mut *mut LevelKvSnapshot,
) -> LevelKvResult {
    clear_last_error();
    finish(snapshot(db, out_snapshot))
}

unsafe fn snapshot(db: *mut LevelKvDatabase, out_snapshot: *mut *mut LevelKvSnapshot) -> FfiResult<()> {
    require_out(out_snapshot, "out_snapshot")?;
    let session = handle_ref(db)?;
    let snapshot = session.db().snapshot()?;
    *out_snapshot = into_handle::<LevelKvSnapshot>(snapshot);
    Ok(())
}

/// Releases a snapshot taken from `db`. A null snapshot is a no-op.
///
/// The snapshot is always released. One from another database is
/// reported as `Failure`, and a null `db` as `NullPointer`.
///
/// # Safety
///
/// - `db` must be null or a live database handle
/// - `snapshot` must be null or a live snapshot handle; it is dangling
///   afterwards
#[no_mangle]
pub unsafe extern "C" fn levelkv_release_snapshot(
    db: *mut LevelKvDatabase,
    snapshot: *mut LevelKvSnapshot,
) -> LevelKvResult {
    clear_last_error();
    finish(release_snapshot(db, snapshot))
}

unsafe fn release_snapshot(db: *mut LevelKvDatabase, snapshot: *mut LevelKvSnapshot) -> FfiResult<()> {
    let snapshot = take_handle(snapshot);
    let session = handle_ref(db)?;
    if let Some(snapshot) = snapshot {
        session.db().release_snapshot(*snapshot)?;
    }
    Ok(())
}

/// Deletes the database in directory `path`.
///
/// A missing directory is `Ok`; an open database fails with `IoError`.
///
/// # Safety
///
/// `path` must be a valid null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn levelkv_destroy(path: *const c_char) -> LevelKvResult {
    clear_last_error();
    finish(borrow_path(path).and_then(|path| Db::destroy(path).map_err(Into::into)))
}

/// Rebuilds the database in directory `path` from its surviving files.
///
/// # Safety
///
/// `path` must be a valid null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn levelkv_repair(path: *const c_char) -> LevelKvResult {
    clear_last_error();
    finish(borrow_path(path).and_then(repair))
}

fn repair(path: &Path) -> FfiResult<()> {
    let options = Options::new().info_log(Arc::new(HostLogger));
    Db::repair(path, options)?;
    Ok(())
}

/// Library version as a static C string.
#[no_mangle]
pub extern "C" fn levelkv_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

unsafe fn read_options<'a>(snapshot: *const LevelKvSnapshot, fill_cache: bool) -> ReadOptions<'a> {
    let options = ReadOptions::new().fill_cache(fill_cache);
    match handle_ref::<LevelKvSnapshot>(snapshot) {
        Ok(snapshot) => options.snapshot(snapshot),
        Err(_) => options,
    }
}

/// Reclaims a snapshot handle without a database, e.g. after its database
/// was closed.
///
/// # Safety
///
/// `snapshot` must be null or a live snapshot handle; it is dangling
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn levelkv_snapshot_close(snapshot: *mut LevelKvSnapshot) {
    drop(take_handle(snapshot));
}
