//! Property, repair and destroy commands.

use super::{open, CommandResult};
use levelkv_core::{destroy_db, repair_db, MemoryLogger, Options};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Prints a named engine property.
pub fn property(path: &Path, name: &str, out: &mut dyn Write) -> CommandResult {
    let db = open(path, false)?;
    let value = db
        .property(name)
        .ok_or_else(|| format!("unknown property: {name}"))?;
    writeln!(out, "{}", value.trim_end())?;
    db.close()?;
    Ok(())
}

/// Repairs the database at `path`, printing what was recovered.
pub fn repair(path: &Path, out: &mut dyn Write) -> CommandResult {
    let log = Arc::new(MemoryLogger::new());
    let options = Options::new().info_log(log.clone());
    repair_db(path, &options)?;

    for line in log.lines() {
        tracing::debug!(target: "levelkv::repair", "{line}");
        writeln!(out, "{line}")?;
    }
    writeln!(out, "Repaired {}", path.display())?;
    Ok(())
}

/// Removes the database at `path`. A missing database is not an error.
pub fn destroy(path: &Path) -> CommandResult {
    destroy_db(path)?;
    tracing::info!(path = %path.display(), "database destroyed");
    Ok(())
}
