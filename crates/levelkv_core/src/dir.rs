//! Database directory management.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK            # advisory lock, one session at a time
//! ├─ MANIFEST        # live tables and counters
//! ├─ 000005.log      # write-ahead log
//! ├─ 000004.ldb      # sorted tables
//! └─ lost/           # files quarantined by repair
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOST_DIR: &str = "lost";

/// Kinds of files the engine owns inside a database directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum FileKind {
    Log(u64),
    Table(u64),
    Manifest,
    TempManifest,
    Lock,
}

impl FileKind {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name {
            LOCK_FILE => return Some(Self::Lock),
            MANIFEST_FILE => return Some(Self::Manifest),
            MANIFEST_TEMP => return Some(Self::TempManifest),
            _ => {}
        }
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number = stem.parse().ok()?;
        match ext {
            "log" => Some(Self::Log(number)),
            "ldb" => Some(Self::Table(number)),
            _ => None,
        }
    }
}

pub(crate) fn log_file_name(number: u64) -> String {
    format!("{number:06}.log")
}

pub(crate) fn table_file_name(number: u64) -> String {
    format!("{number:06}.ldb")
}

/// An open database directory holding the exclusive `LOCK`.
#[derive(Debug)]
pub(crate) struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens a database directory and takes its lock.
    ///
    /// A missing directory is created when `create_if_missing` is set and is
    /// an I/O "not found" error otherwise. A lock held by another session is
    /// [`CoreError::Locked`].
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: database directory does not exist", path.display()),
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "{}: not a directory",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::Locked { path: lock_path });
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn log_path(&self, number: u64) -> PathBuf {
        self.path.join(log_file_name(number))
    }

    pub(crate) fn table_path(&self, number: u64) -> PathBuf {
        self.path.join(table_file_name(number))
    }

    pub(crate) fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    pub(crate) fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE)
    }

    pub(crate) fn lost_dir(&self) -> PathBuf {
        self.path.join(LOST_DIR)
    }

    /// Engine files present in the directory, sorted by kind and number.
    pub(crate) fn files(&self) -> CoreResult<Vec<FileKind>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(kind) = entry.file_name().to_str().and_then(FileKind::parse) {
                files.push(kind);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Path of an engine file.
    pub(crate) fn file_path(&self, kind: FileKind) -> PathBuf {
        match kind {
            FileKind::Log(number) => self.log_path(number),
            FileKind::Table(number) => self.table_path(number),
            FileKind::Manifest => self.manifest_path(),
            FileKind::TempManifest => self.path.join(MANIFEST_TEMP),
            FileKind::Lock => self.lock_path(),
        }
    }

    /// Loads the manifest. Returns `None` for a directory without one.
    pub(crate) fn load_manifest(&self) -> CoreResult<Option<Manifest>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }
        let data = fs::read(&manifest_path)?;
        Ok(Some(Manifest::decode(&data)?))
    }

    /// Saves the manifest atomically: temp file, sync, rename, directory sync.
    pub(crate) fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&manifest.encode())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        self.sync_directory()
    }

    /// Removes an engine file. A file that is already gone is fine.
    pub(crate) fn remove(&self, kind: FileKind) -> CoreResult<()> {
        match fs::remove_file(self.file_path(kind)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Moves an engine file into `lost/`.
    pub(crate) fn quarantine(&self, kind: FileKind) -> CoreResult<PathBuf> {
        let lost = self.lost_dir();
        fs::create_dir_all(&lost)?;
        let source = self.file_path(kind);
        let target = lost.join(source.file_name().unwrap_or_default());
        fs::rename(&source, &target)?;
        Ok(target)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
