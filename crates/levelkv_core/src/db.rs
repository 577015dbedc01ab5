//! The database handle.
//!
//! A [`Db`] owns one database directory (or an in-memory store) and serves
//! reads, writes, iterators and snapshots from any number of threads.
//!
//! ## Concurrency
//!
//! - Writers are serialized by one mutex that also guards the log, the
//!   manifest and the directory lock
//! - Readers take a read lock only long enough to clone the current
//!   [`Version`], then read without locking
//! - A batch's sequence numbers are published only after every operation is
//!   in the memtable, so readers see a batch entirely or not at all

use crate::batch::{BatchOp, WriteBatch};
use crate::cache::BlockCache;
use crate::compaction::{write_table, CompactionFilter, EntrySource, MergingIter};
use crate::dir::{log_file_name, DatabaseDir, FileKind};
use crate::error::{CoreError, CoreResult};
use crate::iterator::DbIterator;
use crate::log::{LogReader, LogWriter, RecoveryMode};
use crate::logger::{Logger, TracingLogger};
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::options::{Options, ReadOptions, WriteOptions, DEFAULT_CACHE_CAPACITY};
use crate::snapshot::{Snapshot, SnapshotList};
use crate::stats::DatabaseStats;
use crate::table::{ReadContext, Table};
use crate::types::{SequenceNumber, MAX_SEQUENCE};
use crate::version::Version;
use levelkv_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::fmt::{self, Write as _};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Number of levels reported by `levelkv.num-files-at-level<N>`.
pub const NUM_LEVELS: usize = 7;

static NEXT_DB_ID: AtomicU64 = AtomicU64::new(1);

/// State owned by whoever holds the writer lock.
struct WriterState {
    /// `None` for in-memory databases and after close.
    dir: Option<DatabaseDir>,
    log: Option<LogWriter>,
    manifest: Manifest,
    /// Logs whose contents are already in tables.
    obsolete_logs: Vec<u64>,
    /// Set when a background step failed; further writes are refused.
    failure: Option<String>,
}

/// An open database.
///
/// # Example
///
/// ```no_run
/// use levelkv_core::{Db, Options, ReadOptions, WriteOptions};
///
/// let db = Db::open("/tmp/example-db", Options::default())?;
/// db.put(&WriteOptions::default(), b"key", b"value")?;
/// assert_eq!(db.get(&ReadOptions::default(), b"key")?, Some(b"value".to_vec()));
/// db.close()?;
/// # Ok::<(), levelkv_core::CoreError>(())
/// ```
pub struct Db {
    id: u64,
    path: Option<PathBuf>,
    options: Options,
    cache: Arc<BlockCache>,
    logger: Arc<dyn Logger>,
    writer: Mutex<WriterState>,
    version: RwLock<Arc<Version>>,
    last_sequence: AtomicU64,
    snapshots: Arc<SnapshotList>,
    stats: DatabaseStats,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("last_sequence", &self.last_sequence())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Opens the database stored in directory `path`.
    ///
    /// # Errors
    ///
    /// - I/O error if the directory holds no database and `create_if_missing`
    ///   is false, or it cannot be created, or is locked by another session
    /// - Invalid argument if it holds one and `error_if_exists` is set
    /// - Corruption if the manifest or a live table is damaged, or a log is
    ///   damaged while `paranoid_checks` is set
    pub fn open(path: impl AsRef<Path>, options: Options) -> CoreResult<Self> {
        let path = path.as_ref();
        let dir = DatabaseDir::open(path, options.create_if_missing)?;

        let existing = dir.load_manifest()?;
        match &existing {
            None if !options.create_if_missing => {
                return Err(CoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: does not exist (create_if_missing is false)", path.display()),
                )));
            }
            Some(_) if options.error_if_exists => {
                return Err(CoreError::invalid_argument(format!(
                    "{}: exists (error_if_exists is true)",
                    path.display()
                )));
            }
            _ => {}
        }
        let mut manifest = existing.unwrap_or_default();

        let cache = shared_cache(&options);
        let logger = shared_logger(&options);

        let mut tables = Vec::with_capacity(manifest.tables.len());
        for &number in &manifest.tables {
            let table_path = dir.table_path(number);
            let backend = FileBackend::open_existing(&table_path).map_err(|err| {
                if err.is_missing() {
                    CoreError::corruption(format!(
                        "{}: table listed in manifest is missing",
                        table_path.display()
                    ))
                } else {
                    err.into()
                }
            })?;
            let table = Table::open(number, Box::new(backend), Some(table_path), Arc::clone(&cache))?;
            tables.push(Arc::new(table));
        }

        let mem = MemTable::new();
        let mut last_sequence = manifest.last_sequence;
        let mut obsolete_logs = Vec::new();
        let mut orphans = Vec::new();
        for kind in dir.files()? {
            match kind {
                FileKind::Log(number) => {
                    manifest.mark_file_number_used(number);
                    if number >= manifest.log_number {
                        let replayed = replay_log(&dir, number, &mem, &options, logger.as_ref())?;
                        last_sequence = last_sequence.max(replayed);
                    }
                    obsolete_logs.push(number);
                }
                FileKind::Table(number) if !manifest.tables.contains(&number) => {
                    manifest.mark_file_number_used(number);
                    orphans.push(kind);
                }
                FileKind::TempManifest => orphans.push(kind),
                _ => {}
            }
        }

        let db = Self::assemble(
            Some(path.to_path_buf()),
            options,
            cache,
            logger,
            WriterState {
                dir: Some(dir),
                log: None,
                manifest,
                obsolete_logs,
                failure: None,
            },
            Version::new(Arc::new(mem), tables),
            last_sequence,
        );

        {
            let mut writer = db.writer.lock();
            db.flush_memtable(&mut writer)?;
            if let Some(dir) = &writer.dir {
                for orphan in orphans {
                    dir.remove(orphan)?;
                }
            }
            db.maybe_compact(&mut writer)?;
        }

        db.logger.log(&format!(
            "opened {} at sequence {} with {} tables",
            path.display(),
            db.last_sequence(),
            db.current_version().tables.len()
        ));
        tracing::info!(path = %path.display(), id = db.id, "database opened");
        Ok(db)
    }

    /// Opens a database that lives only in memory.
    ///
    /// Nothing touches the file system and no lock is taken; the contents
    /// vanish when the database is closed.
    pub fn open_in_memory(options: Options) -> CoreResult<Self> {
        let cache = shared_cache(&options);
        let logger = shared_logger(&options);
        let db = Self::assemble(
            None,
            options,
            cache,
            logger,
            WriterState {
                dir: None,
                log: None,
                manifest: Manifest::new(),
                obsolete_logs: Vec::new(),
                failure: None,
            },
            Version::new(Arc::new(MemTable::new()), Vec::new()),
            0,
        );
        {
            let mut writer = db.writer.lock();
            db.flush_memtable(&mut writer)?;
        }
        tracing::debug!(id = db.id, "in-memory database opened");
        Ok(db)
    }

    fn assemble(
        path: Option<PathBuf>,
        options: Options,
        cache: Arc<BlockCache>,
        logger: Arc<dyn Logger>,
        writer: WriterState,
        version: Version,
        last_sequence: SequenceNumber,
    ) -> Self {
        Self {
            id: NEXT_DB_ID.fetch_add(1, Ordering::Relaxed),
            path,
            options,
            cache,
            logger,
            writer: Mutex::new(writer),
            version: RwLock::new(Arc::new(version)),
            last_sequence: AtomicU64::new(last_sequence),
            snapshots: Arc::new(SnapshotList::new()),
            stats: DatabaseStats::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Unique identity of this open database within the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The directory, or `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The most recently published sequence number.
    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Operation counters.
    #[must_use]
    pub fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    /// The block cache serving this database.
    #[must_use]
    pub fn block_cache(&self) -> &Arc<BlockCache> {
        &self.cache
    }

    /// Returns true once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn current_version(&self) -> Arc<Version> {
        Arc::clone(&self.version.read())
    }

    fn install_version(&self, version: Version) {
        *self.version.write() = Arc::new(version);
    }

    fn name(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "(memory)".to_string(), |p| p.display().to_string())
    }

    fn read_context(&self, options: &ReadOptions<'_>) -> ReadContext {
        ReadContext {
            verify_checksums: options.verify_checksums || self.options.paranoid_checks,
            fill_cache: options.fill_cache,
        }
    }

    fn check_snapshot(&self, snapshot: &Snapshot) -> CoreResult<()> {
        if snapshot.db_id() != self.id {
            return Err(CoreError::invalid_argument(
                "snapshot was taken from a different database",
            ));
        }
        Ok(())
    }

    // === Writes ===

    /// Sets `key` to `value`.
    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, &batch)
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, &batch)
    }

    /// Applies every operation of `batch` atomically.
    ///
    /// On error no operation of the batch becomes visible.
    pub fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> CoreResult<()> {
        batch.validate_for_write()?;

        let mut writer = self.writer.lock();
        self.ensure_open()?;
        if let Some(failure) = &writer.failure {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("writes disabled after earlier failure: {failure}"),
            )));
        }
        if batch.is_empty() {
            return Ok(());
        }

        let first = self.last_sequence() + 1;
        if first + u64::from(batch.count()) > MAX_SEQUENCE {
            return Err(CoreError::not_supported("sequence numbers exhausted"));
        }
        let mut stamped = batch.clone();
        stamped.set_sequence(first);

        let log = writer.log.as_mut().ok_or(CoreError::Closed)?;
        let logged = log.add_record(stamped.contents()).and_then(|_| {
            if options.sync {
                log.sync()
            } else {
                log.flush()
            }
        });
        if let Err(err) = logged {
            writer.failure = Some(err.to_string());
            return Err(err);
        }

        let version = self.current_version();
        let last = stamped.insert_into(&version.mem)?;
        self.last_sequence.store(last, Ordering::Release);

        let (mut puts, mut deletes) = (0, 0);
        for op in stamped.iter().flatten() {
            match op {
                BatchOp::Put { .. } => puts += 1,
                BatchOp::Delete { .. } => deletes += 1,
            }
        }
        self.stats
            .record_batch(puts, deletes, stamped.approximate_size() as u64);

        if version.mem.approximate_memory_usage() >= self.options.write_buffer_size {
            let flushed = self
                .flush_memtable(&mut writer)
                .and_then(|()| self.maybe_compact(&mut writer));
            if let Err(err) = flushed {
                self.logger
                    .log(&format!("background flush failed: {err}; further writes refused"));
                tracing::error!(error = %err, "memtable flush failed");
                writer.failure = Some(err.to_string());
            }
        }
        Ok(())
    }

    // === Reads ===

    /// Reads the value of `key`, or `None` if it is absent.
    pub fn get(&self, options: &ReadOptions<'_>, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        // The version is taken first: it holds every entry up to any
        // sequence published while it is current.
        let version = self.current_version();
        let sequence = match options.snapshot {
            Some(snapshot) => {
                self.check_snapshot(snapshot)?;
                snapshot.sequence()
            }
            None => self.last_sequence(),
        };
        let value = version
            .get(key, sequence, self.read_context(options))?
            .and_then(|found| found.value);
        self.stats
            .record_read(value.as_ref().map_or(0, |v| v.len() as u64));
        Ok(value)
    }

    /// Creates an iterator over the current state, or over
    /// `options.snapshot` when given.
    pub fn iter(&self, options: &ReadOptions<'_>) -> CoreResult<DbIterator> {
        self.ensure_open()?;
        let (version, pin) = match options.snapshot {
            Some(snapshot) => {
                self.check_snapshot(snapshot)?;
                let pin = Snapshot::new(snapshot.sequence(), self.id, Arc::clone(&self.snapshots));
                (self.current_version(), pin)
            }
            None => {
                // Compaction cannot pick its cutoff between the two reads.
                let _writer = self.writer.lock();
                let sequence = self.last_sequence();
                let pin = Snapshot::new(sequence, self.id, Arc::clone(&self.snapshots));
                (self.current_version(), pin)
            }
        };
        self.stats.record_iterator();
        Ok(DbIterator::new(
            version,
            pin,
            self.read_context(options),
            Arc::clone(&self.closed),
        ))
    }

    /// Captures the current state for later reads.
    pub fn snapshot(&self) -> CoreResult<Snapshot> {
        self.ensure_open()?;
        self.stats.record_snapshot();
        let _writer = self.writer.lock();
        Ok(Snapshot::new(
            self.last_sequence(),
            self.id,
            Arc::clone(&self.snapshots),
        ))
    }

    /// Releases a snapshot taken from this database.
    pub fn release_snapshot(&self, snapshot: Snapshot) -> CoreResult<()> {
        self.check_snapshot(&snapshot)?;
        drop(snapshot);
        Ok(())
    }

    // === Properties ===

    /// Answers a named diagnostic property, or `None` for unknown names.
    ///
    /// Known names: `levelkv.num-files-at-level<N>`, `levelkv.stats`,
    /// `levelkv.sstables`, `levelkv.approximate-memory-usage`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        let version = self.current_version();
        let rest = name.strip_prefix("levelkv.")?;

        if let Some(level) = rest.strip_prefix("num-files-at-level") {
            let level: usize = level.parse().ok()?;
            return match level {
                0 => Some(version.tables.len().to_string()),
                l if l < NUM_LEVELS => Some("0".to_string()),
                _ => None,
            };
        }

        match rest {
            "stats" => Some(self.stats_text(&version)),
            "sstables" => Some(sstables_text(&version)),
            "approximate-memory-usage" => Some(
                (version.mem.approximate_memory_usage() + self.cache.usage()).to_string(),
            ),
            _ => None,
        }
    }

    fn stats_text(&self, version: &Version) -> String {
        let mb = |bytes: u64| bytes as f64 / 1_048_576.0;
        let mut out = String::new();
        let _ = writeln!(out, "Level  Files  Size(MB)");
        let _ = writeln!(out, "----------------------");
        let _ = writeln!(
            out,
            "{:>5} {:>6} {:>9.2}",
            0,
            version.tables.len(),
            mb(version.table_bytes())
        );
        let _ = writeln!(
            out,
            "memtable: {} entries, {} bytes",
            version.mem.len(),
            version.mem.approximate_memory_usage()
        );
        let _ = writeln!(out, "sequence: {}", self.last_sequence());
        let _ = writeln!(
            out,
            "writes: puts={} deletes={} batches={} bytes={}",
            self.stats.writes(),
            self.stats.deletes(),
            self.stats.batches(),
            self.stats.bytes_written()
        );
        let _ = writeln!(
            out,
            "reads: gets={} bytes={} iterators={}",
            self.stats.reads(),
            self.stats.bytes_read(),
            self.stats.iterators()
        );
        let _ = writeln!(
            out,
            "flushes: {} compactions: {} (read {:.2} MB, wrote {:.2} MB)",
            self.stats.flushes(),
            self.stats.compactions(),
            mb(self.stats.compaction_bytes_read()),
            mb(self.stats.compaction_bytes_written())
        );
        let _ = writeln!(
            out,
            "snapshots: live={} taken={}",
            self.snapshots.len(),
            self.stats.snapshots()
        );
        let _ = writeln!(
            out,
            "block cache: {}/{} bytes, hits={} misses={}",
            self.cache.usage(),
            self.cache.capacity(),
            self.cache.hits(),
            self.cache.misses()
        );
        out
    }

    // === Maintenance ===

    /// Flushes the memtable and merges every table into one.
    pub fn compact(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        self.ensure_open()?;
        self.flush_memtable(&mut writer)?;
        if self.current_version().tables.len() > 1 {
            self.compact_tables(&mut writer)?;
        }
        Ok(())
    }

    /// Syncs the log and releases the directory lock.
    ///
    /// Closing twice is a no-op. Iterators still alive report
    /// [`CoreError::Closed`] afterwards.
    pub fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        let synced = match writer.log.take() {
            Some(mut log) => log.sync(),
            None => Ok(()),
        };
        writer.dir = None;
        drop(writer);

        self.logger.log(&format!("closed {}", self.name()));
        tracing::info!(id = self.id, "database closed");
        synced
    }

    /// Deletes the database in `path`. A missing directory is not an error.
    pub fn destroy(path: impl AsRef<Path>) -> CoreResult<()> {
        crate::repair::destroy_db(path.as_ref())
    }

    /// Rebuilds the database in `path` from whatever tables and logs survive.
    pub fn repair(path: impl AsRef<Path>, options: Options) -> CoreResult<()> {
        crate::repair::repair_db(path.as_ref(), &options)
    }

    // === Internals (writer lock held) ===

    fn save_manifest(&self, writer: &WriterState) -> CoreResult<()> {
        match &writer.dir {
            Some(dir) => dir.save_manifest(&writer.manifest),
            None => Ok(()),
        }
    }

    fn create_log(&self, writer: &WriterState, number: u64) -> CoreResult<LogWriter> {
        let backend: Box<dyn StorageBackend> = match &writer.dir {
            Some(dir) => Box::new(FileBackend::create(&dir.log_path(number))?),
            None => Box::new(InMemoryBackend::new()),
        };
        Ok(LogWriter::new(backend, number))
    }

    /// Writes the memtable to a table, switches to a fresh log and records
    /// both in the manifest. Also run once at open to finish recovery.
    fn flush_memtable(&self, writer: &mut WriterState) -> CoreResult<()> {
        let current = self.current_version();
        let mut tables = current.tables.clone();

        let mut flushed = None;
        if !current.mem.is_empty() {
            let number = writer.manifest.new_file_number();
            let written = write_table(
                writer.dir.as_ref(),
                number,
                self.options.block_size,
                &self.cache,
                current.mem.entries().map(Ok),
            )?;
            if let Some((table, summary)) = written {
                tables.insert(0, table);
                flushed = Some((number, summary.entry_count));
            }
        }

        let log_number = writer.manifest.new_file_number();
        let log = self.create_log(writer, log_number)?;

        let mut manifest = writer.manifest.clone();
        if let Some((number, _)) = flushed {
            manifest.tables.insert(0, number);
        }
        manifest.log_number = log_number;
        manifest.last_sequence = self.last_sequence();
        writer.manifest = manifest;
        self.save_manifest(writer)?;

        self.install_version(Version::new(Arc::new(MemTable::new()), tables));
        if let Some(old) = writer.log.replace(log) {
            writer.obsolete_logs.push(old.number());
        }
        if let Some(dir) = &writer.dir {
            for number in writer.obsolete_logs.drain(..) {
                dir.remove(FileKind::Log(number))?;
            }
        } else {
            writer.obsolete_logs.clear();
        }

        if let Some((number, entries)) = flushed {
            self.stats.record_flush();
            self.logger.log(&format!(
                "flushed {entries} entries to table {number:06}; now logging to {}",
                log_file_name(log_number)
            ));
            tracing::debug!(table = number, entries, "memtable flushed");
        }
        Ok(())
    }

    fn maybe_compact(&self, writer: &mut WriterState) -> CoreResult<()> {
        if self.current_version().tables.len() >= self.options.l0_compaction_trigger {
            self.compact_tables(writer)?;
        }
        Ok(())
    }

    /// Merges every table into one, dropping what no reader can see.
    fn compact_tables(&self, writer: &mut WriterState) -> CoreResult<()> {
        let current = self.current_version();
        if current.tables.is_empty() {
            return Ok(());
        }
        let oldest_snapshot = self
            .snapshots
            .oldest()
            .unwrap_or_else(|| self.last_sequence());

        let sources: Vec<EntrySource<'_>> = current
            .tables
            .iter()
            .map(|table| Box::new(table.entries()) as EntrySource<'_>)
            .collect();
        let mut filter = CompactionFilter::new(MergingIter::new(sources), oldest_snapshot);

        let number = writer.manifest.new_file_number();
        let written = write_table(
            writer.dir.as_ref(),
            number,
            self.options.block_size,
            &self.cache,
            filter.by_ref(),
        )?;
        let result = filter.result();

        let (tables, bytes_written) = match written {
            Some((table, summary)) => (vec![table], summary.file_size),
            None => (Vec::new(), 0),
        };
        writer.manifest.tables = tables.iter().map(|table| table.number()).collect();
        self.save_manifest(writer)?;

        for table in &current.tables {
            table.mark_obsolete();
        }
        let bytes_read = current.table_bytes();
        self.install_version(Version::new(Arc::clone(&current.mem), tables));
        self.stats.record_compaction(bytes_read, bytes_written);

        self.logger.log(&format!(
            "compacted {} tables ({} entries) into {}: dropped {} obsolete versions and {} deletions",
            current.tables.len(),
            result.input_entries,
            if result.output_entries == 0 {
                "nothing".to_string()
            } else {
                format!("table {number:06} ({} entries)", result.output_entries)
            },
            result.obsolete_versions_removed,
            result.tombstones_removed
        ));
        tracing::debug!(
            inputs = current.tables.len(),
            entries_in = result.input_entries,
            entries_out = result.output_entries,
            "compaction finished"
        );
        Ok(())
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(id = self.id, error = %err, "error closing database");
        }
    }
}

fn shared_cache(options: &Options) -> Arc<BlockCache> {
    options
        .block_cache
        .clone()
        .unwrap_or_else(|| Arc::new(BlockCache::new(DEFAULT_CACHE_CAPACITY)))
}

fn shared_logger(options: &Options) -> Arc<dyn Logger> {
    options
        .info_log
        .clone()
        .unwrap_or_else(|| Arc::new(TracingLogger))
}

/// Replays one log into `mem`. Returns the highest sequence seen.
fn replay_log(
    dir: &DatabaseDir,
    number: u64,
    mem: &MemTable,
    options: &Options,
    logger: &dyn Logger,
) -> CoreResult<SequenceNumber> {
    let name = log_file_name(number);
    let data = std::fs::read(dir.log_path(number))?;
    let mode = if options.paranoid_checks {
        RecoveryMode::Strict
    } else {
        RecoveryMode::TolerateTail
    };
    let mut reader = LogReader::new(data, mode);

    let mut max_sequence = 0;
    let mut batches = 0u64;
    while let Some(payload) = reader.next_record()? {
        let batch = match WriteBatch::from_contents(payload) {
            Ok(batch) => batch,
            Err(err) if !options.paranoid_checks => {
                logger.log(&format!("{name}: skipping malformed batch: {err}"));
                continue;
            }
            Err(err) => return Err(err),
        };
        if batch.is_empty() {
            continue;
        }
        max_sequence = max_sequence.max(batch.insert_into(mem)?);
        batches += 1;
    }

    for reason in reader.corruptions() {
        logger.log(&format!("{name}: {reason}; rest of log dropped"));
        tracing::warn!(log = %name, reason = %reason, "dropped corrupt log tail");
    }
    if reader.dropped_bytes() > 0 {
        logger.log(&format!(
            "{name}: ignored {} bytes at end of log",
            reader.dropped_bytes()
        ));
    }
    logger.log(&format!("recovered {batches} batches from {name}"));
    Ok(max_sequence)
}

fn sstables_text(version: &Version) -> String {
    let mut out = String::new();
    for level in 0..NUM_LEVELS {
        let _ = writeln!(out, "--- level {level} ---");
        if level != 0 {
            continue;
        }
        for table in &version.tables {
            let _ = writeln!(
                out,
                " {}:{}[{} .. {}] entries={} max_sequence={}",
                table.number(),
                table.file_size(),
                table.smallest_user_key().unwrap_or_default().escape_ascii(),
                table.largest_user_key().unwrap_or_default().escape_ascii(),
                table.entry_count(),
                table.max_sequence()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;
    use crate::ErrorKind;
    use tempfile::tempdir;

    fn read() -> ReadOptions<'static> {
        ReadOptions::default()
    }

    fn write() -> WriteOptions {
        WriteOptions::default()
    }

    fn small_options() -> Options {
        Options::new()
            .write_buffer_size(4 * 1024)
            .block_size(256)
            .l0_compaction_trigger(3)
    }

    fn collect(db: &Db, options: &ReadOptions<'_>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut it = db.iter(options).unwrap();
        let mut out = Vec::new();
        it.seek_to_first();
        while it.valid() {
            out.push((it.key().unwrap().to_vec(), it.value().unwrap().to_vec()));
            it.next();
        }
        assert!(it.status().is_none());
        out
    }

    #[test]
    fn put_get_delete() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.put(&write(), b"k", b"v").unwrap();
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"v".to_vec()));

        db.delete(&write(), b"k").unwrap();
        assert_eq!(db.get(&read(), b"k").unwrap(), None);

        db.delete(&write(), b"never-there").unwrap();
        assert_eq!(db.stats().deletes(), 2);
    }

    #[test]
    fn empty_value_is_stored() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.put(&write(), b"k", b"").unwrap();
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn batch_later_operation_wins() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        batch.delete(b"a");
        batch.put(b"b", b"3");
        db.write(&write(), &batch).unwrap();

        assert_eq!(db.get(&read(), b"a").unwrap(), None);
        assert_eq!(db.get(&read(), b"b").unwrap(), Some(b"3".to_vec()));
        assert_eq!(db.last_sequence(), 4);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.write(&write(), &WriteBatch::new()).unwrap();
        assert_eq!(db.last_sequence(), 0);
    }

    #[test]
    fn snapshot_isolation() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.put(&write(), b"k", b"v1").unwrap();
        let snapshot = db.snapshot().unwrap();
        db.put(&write(), b"k", b"v2").unwrap();
        db.put(&write(), b"new", b"x").unwrap();

        let at = ReadOptions::default().snapshot(&snapshot);
        assert_eq!(db.get(&at, b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(db.get(&at, b"new").unwrap(), None);
        assert_eq!(collect(&db, &at).len(), 1);
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"v2".to_vec()));
        db.release_snapshot(snapshot).unwrap();
    }

    #[test]
    fn foreign_snapshot_is_rejected() {
        let a = Db::open_in_memory(Options::default()).unwrap();
        let b = Db::open_in_memory(Options::default()).unwrap();
        let snapshot = a.snapshot().unwrap();
        let err = b
            .get(&ReadOptions::default().snapshot(&snapshot), b"k")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(b.iter(&ReadOptions::default().snapshot(&snapshot)).is_err());
        assert!(b.release_snapshot(snapshot).is_err());
    }

    #[test]
    fn iteration_order_and_navigation() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        for key in [&b"b"[..], b"a", b"\xff", b"c"] {
            db.put(&write(), key, key).unwrap();
        }
        let keys: Vec<Vec<u8>> = collect(&db, &read()).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"\xff".to_vec()]
        );

        let mut it = db.iter(&read()).unwrap();
        it.seek(b"bb");
        assert_eq!(it.key(), Some(&b"c"[..]));
        it.prev();
        assert_eq!(it.key(), Some(&b"b"[..]));
        it.seek_to_last();
        assert_eq!(it.key(), Some(&b"\xff"[..]));
    }

    #[test]
    fn empty_database_iterates_nothing() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        let mut it = db.iter(&read()).unwrap();
        it.seek_to_first();
        assert!(!it.valid());
        it.seek_to_last();
        assert!(!it.valid());
        assert!(it.status().is_none());
    }

    #[test]
    fn iterator_does_not_see_later_writes() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.put(&write(), b"a", b"1").unwrap();
        let mut it = db.iter(&read()).unwrap();
        db.put(&write(), b"b", b"2").unwrap();
        it.seek_to_first();
        it.next();
        assert!(!it.valid());
    }

    #[test]
    fn closed_database_rejects_operations() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.put(&write(), b"a", b"1").unwrap();
        let mut it = db.iter(&read()).unwrap();
        db.close().unwrap();
        db.close().unwrap();

        assert!(matches!(db.get(&read(), b"a"), Err(CoreError::Closed)));
        assert!(matches!(db.put(&write(), b"a", b"2"), Err(CoreError::Closed)));
        assert!(db.snapshot().is_err());
        assert!(db.property("levelkv.stats").is_none());

        it.seek_to_first();
        assert!(!it.valid());
        assert_eq!(it.status().map(CoreError::kind), Some(ErrorKind::Closed));
    }

    #[test]
    fn reopen_recovers_from_log() {
        let temp = tempdir().unwrap();
        {
            let db = Db::open(temp.path(), Options::default()).unwrap();
            db.put(&WriteOptions::new(true), b"durable", b"yes").unwrap();
            db.put(&write(), b"gone", b"x").unwrap();
            db.delete(&write(), b"gone").unwrap();
        }
        let db = Db::open(temp.path(), Options::default()).unwrap();
        assert_eq!(db.get(&read(), b"durable").unwrap(), Some(b"yes".to_vec()));
        assert_eq!(db.get(&read(), b"gone").unwrap(), None);
        assert_eq!(db.last_sequence(), 3);
        assert_eq!(db.property("levelkv.num-files-at-level0"), Some("1".into()));

        db.put(&write(), b"after", b"reopen").unwrap();
        assert_eq!(db.last_sequence(), 4);
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let first = Db::open(temp.path(), Options::default()).unwrap();
        first.put(&write(), b"k", b"v").unwrap();

        let err = Db::open(temp.path(), Options::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(first.get(&read(), b"k").unwrap(), Some(b"v".to_vec()));

        first.close().unwrap();
        Db::open(temp.path(), Options::default()).unwrap();
    }

    #[test]
    fn open_flags() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("missing");
        let err = Db::open(&missing, Options::new().create_if_missing(false)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let empty = temp.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        let err = Db::open(&empty, Options::new().create_if_missing(false)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("does not exist"));

        let path = temp.path().join("db");
        drop(Db::open(&path, Options::default()).unwrap());
        let err = Db::open(&path, Options::new().error_if_exists(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        Db::open(&path, Options::new().create_if_missing(false)).unwrap();
    }

    #[test]
    fn flush_and_compaction_preserve_contents() {
        let temp = tempdir().unwrap();
        let db = Db::open(temp.path(), small_options()).unwrap();
        for round in 0..6u32 {
            for i in 0..100u32 {
                let key = format!("key{i:04}");
                let value = format!("value-{round}-{i}");
                db.put(&write(), key.as_bytes(), value.as_bytes()).unwrap();
            }
        }
        for i in (0..100u32).step_by(2) {
            db.delete(&write(), format!("key{i:04}").as_bytes()).unwrap();
        }
        assert!(db.stats().flushes() > 0);
        assert!(db.stats().compactions() > 0);

        let rows = collect(&db, &read());
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0], (b"key0001".to_vec(), b"value-5-1".to_vec()));

        db.compact().unwrap();
        assert_eq!(db.property("levelkv.num-files-at-level0"), Some("1".into()));
        assert_eq!(collect(&db, &read()), rows);

        drop(db);
        let db = Db::open(temp.path(), small_options()).unwrap();
        assert_eq!(collect(&db, &read()), rows);
    }

    #[test]
    fn compaction_preserves_live_snapshot_view() {
        let db = Db::open_in_memory(small_options()).unwrap();
        db.put(&write(), b"k", b"old").unwrap();
        db.put(&write(), b"doomed", b"here").unwrap();
        let snapshot = db.snapshot().unwrap();

        db.put(&write(), b"k", b"new").unwrap();
        db.delete(&write(), b"doomed").unwrap();
        db.compact().unwrap();
        db.put(&write(), b"other", b"1").unwrap();
        db.compact().unwrap();

        let at = ReadOptions::default().snapshot(&snapshot);
        assert_eq!(db.get(&at, b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(db.get(&at, b"doomed").unwrap(), Some(b"here".to_vec()));
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"new".to_vec()));
        assert_eq!(db.get(&read(), b"doomed").unwrap(), None);

        drop(snapshot);
        db.compact().unwrap();
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn obsolete_tables_are_deleted() {
        let temp = tempdir().unwrap();
        let db = Db::open(temp.path(), small_options()).unwrap();
        for i in 0..2000u32 {
            db.put(&write(), format!("k{i:05}").as_bytes(), &[7u8; 32])
                .unwrap();
        }
        db.compact().unwrap();
        let tables = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".ldb"))
            .count();
        assert_eq!(tables, 1);
    }

    #[test]
    fn properties() {
        let db = Db::open_in_memory(Options::default()).unwrap();
        db.put(&write(), b"k", b"v").unwrap();

        assert_eq!(db.property("levelkv.num-files-at-level0"), Some("0".into()));
        assert_eq!(db.property("levelkv.num-files-at-level6"), Some("0".into()));
        assert_eq!(db.property("levelkv.num-files-at-level7"), None);
        assert_eq!(db.property("levelkv.num-files-at-levelx"), None);
        assert!(db.property("levelkv.stats").unwrap().contains("Level"));
        assert!(db.property("levelkv.sstables").unwrap().contains("--- level 0 ---"));
        let usage: usize = db
            .property("levelkv.approximate-memory-usage")
            .unwrap()
            .parse()
            .unwrap();
        assert!(usage > 0);
        assert_eq!(db.property("levelkv.nope"), None);
        assert_eq!(db.property("other.stats"), None);
    }

    #[test]
    fn info_log_receives_engine_lines() {
        let temp = tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let db = Db::open(temp.path(), Options::new().info_log(logger.clone())).unwrap();
        db.close().unwrap();
        assert!(logger.contains("opened"));
        assert!(logger.contains("closed"));
    }

    #[test]
    fn corrupt_log_tail_is_dropped_unless_paranoid() {
        let temp = tempdir().unwrap();
        {
            let db = Db::open(temp.path(), Options::default()).unwrap();
            db.put(&write(), b"first", b"1").unwrap();
            db.put(&write(), b"second", b"2").unwrap();
        }
        let log = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .find(|p| p.extension().is_some_and(|ext| ext == "log"))
            .unwrap();
        let mut data = std::fs::read(&log).unwrap();
        let last = data.len() - 3;
        data[last] ^= 0xFF;
        std::fs::write(&log, &data).unwrap();

        let err = Db::open(temp.path(), Options::new().paranoid_checks(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);

        let logger = Arc::new(MemoryLogger::new());
        let db = Db::open(temp.path(), Options::new().info_log(logger.clone())).unwrap();
        assert_eq!(db.get(&read(), b"first").unwrap(), Some(b"1".to_vec()));
        assert_eq!(db.get(&read(), b"second").unwrap(), None);
        assert!(logger.contains("checksum mismatch"));
    }

    #[test]
    fn shared_cache_is_used() {
        let cache = Arc::new(BlockCache::new(1 << 20));
        let db = Db::open_in_memory(small_options().block_cache(Arc::clone(&cache))).unwrap();
        for i in 0..500u32 {
            db.put(&write(), format!("k{i:04}").as_bytes(), b"v").unwrap();
        }
        db.compact().unwrap();
        db.get(&read(), b"k0001").unwrap();
        assert!(Arc::ptr_eq(db.block_cache(), &cache));
        assert!(cache.usage() > 0);
    }
}
