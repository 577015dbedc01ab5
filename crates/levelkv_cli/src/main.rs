//! LevelKV CLI
//!
//! Command-line tools for inspecting and maintaining LevelKV databases.
//!
//! # Commands
//!
//! - `get` / `put` / `delete` - Single-key reads and writes
//! - `scan` - Print a key range in text or JSON
//! - `property` - Print an engine property such as `levelkv.stats`
//! - `repair` - Rebuild a damaged database from its surviving files
//! - `destroy` - Remove a database directory

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LevelKV command-line database tools.
#[derive(Parser)]
#[command(name = "levelkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// Key to look up
        key: String,
    },

    /// Store a value under a key
    Put {
        /// Key to write
        key: String,

        /// Value to store
        value: String,

        /// Sync the log before returning
        #[arg(short, long)]
        sync: bool,
    },

    /// Delete a key
    Delete {
        /// Key to delete
        key: String,

        /// Sync the log before returning
        #[arg(short, long)]
        sync: bool,
    },

    /// Print keys and values in order
    Scan {
        /// Start at the first key at or after this one
        #[arg(short, long)]
        from: Option<String>,

        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Walk backwards from the last key
        #[arg(short, long)]
        reverse: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print an engine property
    Property {
        /// Property name, e.g. levelkv.stats
        name: String,
    },

    /// Rebuild a damaged database
    Repair,

    /// Delete a database and its directory
    Destroy,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Get { key } => {
            let path = cli.path.ok_or("Database path required for get")?;
            commands::read::get(&path, &key, &mut out)?;
        }
        Commands::Put { key, value, sync } => {
            let path = cli.path.ok_or("Database path required for put")?;
            commands::write::put(&path, &key, &value, sync)?;
        }
        Commands::Delete { key, sync } => {
            let path = cli.path.ok_or("Database path required for delete")?;
            commands::write::delete(&path, &key, sync)?;
        }
        Commands::Scan {
            from,
            limit,
            reverse,
            format,
        } => {
            let path = cli.path.ok_or("Database path required for scan")?;
            let scan = commands::read::Scan {
                from,
                limit,
                reverse,
            };
            commands::read::scan(&path, &scan, format, &mut out)?;
        }
        Commands::Property { name } => {
            let path = cli.path.ok_or("Database path required for property")?;
            commands::maintenance::property(&path, &name, &mut out)?;
        }
        Commands::Repair => {
            let path = cli.path.ok_or("Database path required for repair")?;
            commands::maintenance::repair(&path, &mut out)?;
        }
        Commands::Destroy => {
            let path = cli.path.ok_or("Database path required for destroy")?;
            commands::maintenance::destroy(&path)?;
        }
        Commands::Version => {
            println!("LevelKV CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
