//! Put and delete commands.

use super::{open, CommandResult};
use levelkv_core::WriteOptions;
use std::path::Path;

/// Stores `value` under `key`, creating the database if needed.
pub fn put(path: &Path, key: &str, value: &str, sync: bool) -> CommandResult {
    let db = open(path, true)?;
    db.put(&WriteOptions::new(sync), key.as_bytes(), value.as_bytes())?;
    tracing::debug!(key, sync, "put");
    db.close()?;
    Ok(())
}

/// Deletes `key`. Deleting an absent key succeeds.
pub fn delete(path: &Path, key: &str, sync: bool) -> CommandResult {
    let db = open(path, false)?;
    db.delete(&WriteOptions::new(sync), key.as_bytes())?;
    tracing::debug!(key, sync, "delete");
    db.close()?;
    Ok(())
}
