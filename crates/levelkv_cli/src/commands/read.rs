//! Get and scan commands.

use super::{display, open, CommandResult, OutputFormat};
use levelkv_core::{DbIterator, ReadOptions};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One printed entry.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ScanEntry {
    /// Key, lossily decoded as UTF-8.
    pub key: String,
    /// Value, lossily decoded as UTF-8.
    pub value: String,
}

/// Range and direction of a scan.
#[derive(Debug, Default)]
pub struct Scan {
    /// First key to include (or last, when reversed).
    pub from: Option<String>,
    /// Maximum number of entries.
    pub limit: Option<usize>,
    /// Walk from the end towards the start.
    pub reverse: bool,
}

/// Prints the value stored under `key`.
pub fn get(path: &Path, key: &str, out: &mut dyn Write) -> CommandResult {
    let db = open(path, false)?;
    match db.get(&ReadOptions::new(), key.as_bytes())? {
        Some(value) => writeln!(out, "{}", display(&value))?,
        None => return Err(format!("key not found: {key}").into()),
    }
    db.close()?;
    Ok(())
}

/// Prints a range of entries.
pub fn scan(path: &Path, scan: &Scan, format: OutputFormat, out: &mut dyn Write) -> CommandResult {
    let db = open(path, false)?;
    let mut iter = db.iter(&ReadOptions::new().fill_cache(false))?;
    let entries = collect(&mut iter, scan);
    if let Some(err) = iter.status() {
        return Err(err.to_string().into());
    }

    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?,
        OutputFormat::Text => {
            for entry in &entries {
                writeln!(out, "{} => {}", entry.key, entry.value)?;
            }
        }
    }
    db.close()?;
    Ok(())
}

fn collect(iter: &mut DbIterator, scan: &Scan) -> Vec<ScanEntry> {
    position(iter, scan);
    let limit = scan.limit.unwrap_or(usize::MAX);
    let mut entries = Vec::new();
    while entries.len() < limit {
        let (Some(key), Some(value)) = (iter.key(), iter.value()) else {
            break;
        };
        entries.push(ScanEntry {
            key: display(key),
            value: display(value),
        });
        if scan.reverse {
            iter.prev();
        } else {
            iter.next();
        }
    }
    entries
}

/// Places the cursor on the first entry of the scan.
///
/// A reverse scan from `k` starts at the last key at or before `k`.
fn position(iter: &mut DbIterator, scan: &Scan) {
    match (&scan.from, scan.reverse) {
        (None, false) => iter.seek_to_first(),
        (None, true) => iter.seek_to_last(),
        (Some(from), false) => iter.seek(from.as_bytes()),
        (Some(from), true) => {
            iter.seek(from.as_bytes());
            if !iter.valid() {
                iter.seek_to_last();
            } else if iter.key() != Some(from.as_bytes()) {
                iter.prev();
            }
        }
    }
}
