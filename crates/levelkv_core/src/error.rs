//! Error types for the LevelKV engine.
//!
//! Every engine operation reports a [`CoreError`]. Callers that need the
//! coarse "status" of an outcome (the way the bridge does when it picks a
//! host failure) use [`CoreError::kind`].

use levelkv_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A requested entity does not exist.
    NotFound,
    /// Stored data failed validation.
    Corruption,
    /// The file system reported an error, including a held lock.
    Io,
    /// The caller passed something the engine cannot accept.
    InvalidArgument,
    /// The operation is not available for this database.
    NotSupported,
    /// The database has already been closed.
    Closed,
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("IO error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error outside a storage backend (directories, renames).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Another session holds the directory lock.
    #[error("IO error: lock {}: already held by another session", path.display())]
    Locked {
        /// The lock file path.
        path: PathBuf,
    },

    /// Stored data is malformed.
    #[error("Corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// A checksum did not match its data.
    #[error("Corruption: checksum mismatch in {context}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// What was being verified.
        context: &'static str,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Invalid argument from the caller.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Why the argument was rejected.
        message: String,
    },

    /// Operation not supported.
    #[error("Not implemented: {message}")]
    NotSupported {
        /// What is not supported.
        message: String,
    },

    /// Something the caller asked for does not exist.
    #[error("NotFound: {message}")]
    NotFound {
        /// What was not found.
        message: String,
    },

    /// The database has been closed.
    #[error("database is closed")]
    Closed,
}

impl CoreError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Returns the status class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) | Self::Io(_) | Self::Locked { .. } => ErrorKind::Io,
            Self::Corruption { .. } | Self::ChecksumMismatch { .. } => ErrorKind::Corruption,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotSupported { .. } => ErrorKind::NotSupported,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Closed => ErrorKind::Closed,
        }
    }

    /// Returns true for corruption-class errors.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        self.kind() == ErrorKind::Corruption
    }

    /// Returns true for I/O-class errors.
    #[must_use]
    pub fn is_io(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(CoreError::corruption("bad block").kind(), ErrorKind::Corruption);
        assert_eq!(
            CoreError::ChecksumMismatch {
                context: "log record",
                expected: 1,
                actual: 2
            }
            .kind(),
            ErrorKind::Corruption
        );
        assert_eq!(
            CoreError::Locked {
                path: PathBuf::from("db/LOCK")
            }
            .kind(),
            ErrorKind::Io
        );
        assert_eq!(
            CoreError::from(io::Error::new(io::ErrorKind::Other, "disk")).kind(),
            ErrorKind::Io
        );
        assert_eq!(CoreError::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(CoreError::not_supported("x").kind(), ErrorKind::NotSupported);
        assert_eq!(CoreError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::Closed.kind(), ErrorKind::Closed);
    }

    #[test]
    fn messages_carry_status_prefix() {
        assert_eq!(
            CoreError::corruption("truncated block").to_string(),
            "Corruption: truncated block"
        );
        assert_eq!(
            CoreError::invalid_argument("db: does not exist").to_string(),
            "Invalid argument: db: does not exist"
        );
        let locked = CoreError::Locked {
            path: PathBuf::from("db/LOCK"),
        };
        assert!(locked.to_string().starts_with("IO error: lock db/LOCK"));
        assert!(locked.is_io());
    }
}
