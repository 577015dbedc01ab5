//! Destroying and repairing database directories.

use crate::batch::WriteBatch;
use crate::cache::BlockCache;
use crate::compaction::write_table;
use crate::dir::{log_file_name, table_file_name, DatabaseDir, FileKind};
use crate::error::{CoreError, CoreResult};
use crate::log::{LogReader, RecoveryMode};
use crate::logger::{Logger, TracingLogger};
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::options::{Options, DEFAULT_CACHE_CAPACITY};
use crate::table::Table;
use crate::types::SequenceNumber;
use levelkv_storage::FileBackend;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Deletes every engine file in `path`, then the directory itself.
///
/// A missing directory is not an error. Files the engine does not own are
/// left alone, in which case the directory stays too.
pub fn destroy_db(path: &Path) -> CoreResult<()> {
    if !path.exists() {
        return Ok(());
    }
    let dir = DatabaseDir::open(path, false)?;

    let mut first_error = None;
    for kind in dir.files()? {
        if kind == FileKind::Lock {
            continue;
        }
        if let Err(err) = dir.remove(kind) {
            tracing::warn!(path = %dir.file_path(kind).display(), error = %err, "failed to delete");
            first_error.get_or_insert(err);
        }
    }
    let lost = dir.lost_dir();
    if lost.exists() {
        if let Err(err) = fs::remove_dir_all(&lost) {
            first_error.get_or_insert(err.into());
        }
    }

    let lock_path = dir.lock_path();
    drop(dir);
    let _ = fs::remove_file(lock_path);
    let _ = fs::remove_dir(path);

    tracing::info!(path = %path.display(), "database destroyed");
    first_error.map_or(Ok(()), Err)
}

/// Rebuilds the manifest of the database in `path` from the files present.
///
/// Tables that fail a full checked scan and logs that were replayed are
/// moved to `lost/`. Every readable log record becomes part of a new table,
/// so some data may be lost but the database opens afterwards.
pub fn repair_db(path: &Path, options: &Options) -> CoreResult<()> {
    let dir = DatabaseDir::open(path, false)?;
    let logger: Arc<dyn Logger> = options
        .info_log
        .clone()
        .unwrap_or_else(|| Arc::new(TracingLogger));
    let cache = options
        .block_cache
        .clone()
        .unwrap_or_else(|| Arc::new(BlockCache::new(DEFAULT_CACHE_CAPACITY)));

    let mut manifest = Manifest::new();
    match dir.load_manifest() {
        Ok(Some(old)) => {
            manifest.last_sequence = old.last_sequence;
            manifest.mark_file_number_used(old.next_file_number.saturating_sub(1));
        }
        Ok(None) => {}
        Err(err) => logger.log(&format!("repair: ignoring unreadable manifest: {err}")),
    }

    let files = dir.files()?;
    for kind in &files {
        if let FileKind::Log(number) | FileKind::Table(number) = *kind {
            manifest.mark_file_number_used(number);
        }
    }

    let mut tables = Vec::new();
    let mut max_sequence: SequenceNumber = manifest.last_sequence;
    let mut lost_tables = 0usize;
    for kind in &files {
        let FileKind::Table(number) = *kind else {
            continue;
        };
        match scan_table(&dir, number, &cache) {
            Ok(table) => {
                max_sequence = max_sequence.max(table.max_sequence());
                tables.push(number);
            }
            Err(err) => {
                lost_tables += 1;
                logger.log(&format!(
                    "repair: {}: {err}; moved to lost/",
                    table_file_name(number)
                ));
                dir.quarantine(*kind)?;
            }
        }
    }

    let mem = MemTable::new();
    let mut logs = Vec::new();
    for kind in &files {
        let FileKind::Log(number) = *kind else {
            continue;
        };
        let recovered = replay_for_repair(&dir, number, &mem, logger.as_ref())?;
        max_sequence = max_sequence.max(recovered);
        logs.push(*kind);
    }

    if !mem.is_empty() {
        let number = manifest.new_file_number();
        let written = write_table(
            Some(&dir),
            number,
            options.block_size,
            &cache,
            mem.entries().map(Ok),
        )?;
        if let Some((table, summary)) = written {
            max_sequence = max_sequence.max(summary.max_sequence);
            tables.push(table.number());
        }
    }

    tables.sort_unstable_by(|a, b| b.cmp(a));
    manifest.tables = tables;
    manifest.last_sequence = max_sequence;
    manifest.log_number = manifest.next_file_number;
    dir.save_manifest(&manifest)?;

    for kind in logs {
        dir.quarantine(kind)?;
    }
    dir.remove(FileKind::TempManifest)?;

    logger.log(&format!(
        "repair: {} tables kept, {lost_tables} lost, {} entries recovered from logs, sequence {max_sequence}",
        manifest.tables.len(),
        mem.len()
    ));
    tracing::info!(path = %path.display(), tables = manifest.tables.len(), "database repaired");
    Ok(())
}

/// Opens a table and reads every block with checksums verified.
fn scan_table(dir: &DatabaseDir, number: u64, cache: &Arc<BlockCache>) -> CoreResult<Arc<Table>> {
    let path = dir.table_path(number);
    let backend = FileBackend::open_existing(&path)?;
    let table = Arc::new(Table::open(number, Box::new(backend), Some(path), Arc::clone(cache))?);
    let mut seen = 0u64;
    for entry in table.entries() {
        entry?;
        seen += 1;
    }
    if seen != table.entry_count() {
        return Err(CoreError::corruption(format!(
            "table {number:06}: footer claims {} entries, found {seen}",
            table.entry_count()
        )));
    }
    Ok(table)
}

/// Replays whatever intact records a log holds, skipping damage.
fn replay_for_repair(
    dir: &DatabaseDir,
    number: u64,
    mem: &MemTable,
    logger: &dyn Logger,
) -> CoreResult<SequenceNumber> {
    let name = log_file_name(number);
    let mut reader = LogReader::new(fs::read(dir.log_path(number))?, RecoveryMode::Resync);
    let mut max_sequence = 0;
    while let Some(payload) = reader.next_record()? {
        match WriteBatch::from_contents(payload) {
            Ok(batch) if !batch.is_empty() => {
                max_sequence = max_sequence.max(batch.insert_into(mem)?);
            }
            Ok(_) => {}
            Err(err) => logger.log(&format!("repair: {name}: skipping batch: {err}")),
        }
    }
    for reason in reader.corruptions() {
        logger.log(&format!("repair: {name}: {reason}"));
    }
    if reader.dropped_bytes() > 0 {
        logger.log(&format!(
            "repair: {name}: dropped {} bytes",
            reader.dropped_bytes()
        ));
    }
    Ok(max_sequence)
}
