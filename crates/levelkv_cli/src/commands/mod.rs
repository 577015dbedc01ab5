//! CLI command implementations.

pub mod maintenance;
pub mod read;
pub mod write;

use clap::ValueEnum;
use levelkv_core::{Db, Options};
use std::path::Path;

/// Result type shared by every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// How listings are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `key => value` line per entry.
    Text,
    /// A pretty-printed JSON array.
    Json,
}

/// Opens an existing database; only writes may create one.
fn open(path: &Path, create: bool) -> CommandResult<Db> {
    let options = Options::new().create_if_missing(create);
    Ok(Db::open(path, options)?)
}

/// Lossy text form of a key or value for display.
fn display(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
