//! Type definitions for FFI.

use std::ffi::c_char;

/// An opaque database handle.
///
/// Points to a boxed session. Never dereference or modify directly.
#[repr(C)]
pub struct LevelKvDatabase {
    _private: [u8; 0],
}

/// An opaque iterator handle.
#[repr(C)]
pub struct LevelKvIterator {
    _private: [u8; 0],
}

/// An opaque snapshot handle.
#[repr(C)]
pub struct LevelKvSnapshot {
    _private: [u8; 0],
}

/// An opaque write batch handle.
#[repr(C)]
pub struct LevelKvWriteBatch {
    _private: [u8; 0],
}

/// Configuration for opening a database.
///
/// Zero sizes select the engine defaults.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LevelKvOpenOptions {
    /// Create the database if it does not exist.
    pub create_if_missing: bool,
    /// Fail if the database already exists.
    pub error_if_exists: bool,
    /// Treat any detected corruption as fatal.
    pub paranoid_checks: bool,
    /// Block cache size in bytes; 0 means no session-owned cache.
    pub cache_size: usize,
    /// Data block size in bytes.
    pub block_size: usize,
    /// Memtable size that triggers a flush, in bytes.
    pub write_buffer_size: usize,
}

impl Default for LevelKvOpenOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: false,
            cache_size: 0,
            block_size: 0,
            write_buffer_size: 0,
        }
    }
}

/// Host callback receiving diagnostic lines.
///
/// Both arguments are NUL-terminated UTF-8 strings valid only for the
/// duration of the call. `component` is `levelkv:engine` or
/// `levelkv:iterator`.
pub type LevelKvLogSink = extern "C" fn(component: *const c_char, message: *const c_char);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_options_default() {
        let options = LevelKvOpenOptions::default();
        assert!(options.create_if_missing);
        assert!(!options.error_if_exists);
        assert!(!options.paranoid_checks);
        assert_eq!(options.cache_size, 0);
        assert_eq!(options.block_size, 0);
        assert_eq!(options.write_buffer_size, 0);
    }
}
