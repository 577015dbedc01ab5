//! Result codes, failure names and the thread-local last error.
//!
//! Every exported function clears the last error on entry. A non-`Ok`
//! result always leaves a message behind, readable with
//! [`levelkv_last_error`] until the next call on the same thread.

use levelkv_core::{CoreError, ErrorKind};
use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};

/// Result code for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKvResult {
    /// Operation succeeded.
    Ok = 0,
    /// Engine failure outside the other categories.
    Failure = 1,
    /// Invalid argument, from the bridge or the engine.
    InvalidArgument = 2,
    /// Requested item does not exist.
    NotFound = 3,
    /// Stored data is corrupt.
    Corruption = 4,
    /// I/O error, including a database locked by another session.
    IoError = 5,
    /// A required pointer was null.
    NullPointer = 6,
    /// The database behind a handle has been closed.
    Closed = 7,
    /// Operation not supported by the engine.
    NotSupported = 8,
}

impl LevelKvResult {
    /// Returns true if the result indicates success.
    pub fn is_ok(self) -> bool {
        self == LevelKvResult::Ok
    }

    /// Returns true if the result indicates an error.
    pub fn is_err(self) -> bool {
        self != LevelKvResult::Ok
    }

    /// Name of the failure the host should raise, `None` for `Ok`.
    pub fn failure_name(self) -> Option<&'static CStr> {
        match self {
            LevelKvResult::Ok => None,
            LevelKvResult::IoError => Some(c"StorageIOFailure"),
            LevelKvResult::Corruption => Some(c"StorageCorruptionFailure"),
            LevelKvResult::NotFound => Some(c"StorageNotFound"),
            LevelKvResult::InvalidArgument | LevelKvResult::NullPointer => {
                Some(c"IllegalArgumentFailure")
            }
            LevelKvResult::Closed => Some(c"StorageClosedFailure"),
            LevelKvResult::Failure | LevelKvResult::NotSupported => Some(c"StorageFailure"),
        }
    }
}

/// Error code type for C compatibility.
pub type ErrorCode = i32;

impl From<LevelKvResult> for ErrorCode {
    fn from(result: LevelKvResult) -> Self {
        result as ErrorCode
    }
}

impl From<ErrorCode> for LevelKvResult {
    fn from(code: ErrorCode) -> Self {
        match code {
            0 => LevelKvResult::Ok,
            2 => LevelKvResult::InvalidArgument,
            3 => LevelKvResult::NotFound,
            4 => LevelKvResult::Corruption,
            5 => LevelKvResult::IoError,
            6 => LevelKvResult::NullPointer,
            7 => LevelKvResult::Closed,
            8 => LevelKvResult::NotSupported,
            _ => LevelKvResult::Failure,
        }
    }
}

impl From<ErrorKind> for LevelKvResult {
    /// Engine status to host code. `NotFound` only reaches here from
    /// operations other than reads, where it is a plain failure. Engine
    /// invalid-argument statuses are storage failures; `InvalidArgument`
    /// is kept for arguments the bridge itself rejects.
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Corruption => LevelKvResult::Corruption,
            ErrorKind::Io => LevelKvResult::IoError,
            ErrorKind::InvalidArgument => LevelKvResult::Failure,
            ErrorKind::Closed => LevelKvResult::Closed,
            ErrorKind::NotSupported => LevelKvResult::NotSupported,
            ErrorKind::NotFound => LevelKvResult::Failure,
        }
    }
}

/// Errors raised inside the bridge before they become result codes.
#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    /// The engine reported a failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An engine status observed after the fact, such as an iterator's.
    #[error("{message}")]
    Status {
        /// Engine classification.
        kind: ErrorKind,
        /// Engine message.
        message: String,
    },

    /// A required pointer argument was null.
    #[error("null pointer argument: {0}")]
    NullPointer(&'static str),

    /// An argument was rejected by the bridge.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl FfiError {
    /// Captures an engine error that stays owned elsewhere.
    pub fn status(err: &CoreError) -> Self {
        FfiError::Status {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// The result code for this error.
    pub fn code(&self) -> LevelKvResult {
        match self {
            FfiError::Core(err) => err.kind().into(),
            FfiError::Status { kind, .. } => (*kind).into(),
            FfiError::NullPointer(_) => LevelKvResult::NullPointer,
            FfiError::InvalidArgument(_) => LevelKvResult::InvalidArgument,
        }
    }

    /// Stores the message as the last error and returns the code.
    pub fn report(self) -> LevelKvResult {
        let code = self.code();
        set_last_error(self.to_string());
        code
    }
}

/// Result type inside the bridge.
pub type FfiResult<T> = Result<T, FfiError>;

/// Converts an internal result into a code, recording any error.
pub(crate) fn finish(result: FfiResult<()>) -> LevelKvResult {
    match result {
        Ok(()) => LevelKvResult::Ok,
        Err(err) => err.report(),
    }
}

// Thread-local storage for last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let mut bytes = message.into().into_bytes();
    bytes.retain(|&b| b != 0);
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(bytes).ok();
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Returns the last error message as a C string, or null if none is set.
///
/// The pointer is valid until the next LevelKV call on this thread.
#[no_mangle]
pub extern "C" fn levelkv_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn levelkv_clear_error() {
    clear_last_error();
}

/// Returns the failure name for a result code, or null for `Ok`.
///
/// The string is static and must not be freed.
#[no_mangle]
pub extern "C" fn levelkv_failure_name(code: ErrorCode) -> *const c_char {
    LevelKvResult::from(code)
        .failure_name()
        .map_or(std::ptr::null(), CStr::as_ptr)
}
