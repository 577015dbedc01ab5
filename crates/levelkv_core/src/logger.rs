//! Engine info log.
//!
//! The engine reports notable events (recovery, flushes, compactions,
//! tolerated corruption) as plain text lines through a [`Logger`]. Embedders
//! supply their own sink; the default forwards to `tracing`.

use parking_lot::Mutex;

/// Destination for engine info-log lines.
pub trait Logger: Send + Sync {
    /// Records one line of engine diagnostics.
    fn log(&self, message: &str);
}

/// Forwards info-log lines to `tracing` at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "levelkv::engine", "{message}");
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns true if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}
