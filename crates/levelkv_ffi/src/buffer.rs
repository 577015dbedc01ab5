//! Moving bytes and strings across the boundary.
//!
//! Host data is borrowed for the duration of one call and never retained.
//! Engine results are copied into exactly-sized Rust allocations that the
//! host releases with [`levelkv_free_buffer`] or [`levelkv_free_string`].
//!
//! A zero-length result is returned as the null buffer, so an empty value
//! and an absent value look the same to the host.

use crate::error::{FfiError, FfiResult};
use std::ffi::{c_char, CStr, CString};
use std::path::Path;

/// A byte buffer for FFI.
///
/// Memory is owned by Rust. Call `levelkv_free_buffer` to release.
#[repr(C)]
#[derive(Debug)]
pub struct LevelKvBuffer {
    /// Pointer to data, null when absent.
    pub data: *mut u8,
    /// Length in bytes.
    pub len: usize,
    /// Capacity (for internal use).
    pub capacity: usize,
}

impl LevelKvBuffer {
    /// Creates a buffer from a Vec. An empty Vec becomes the null buffer.
    pub fn from_vec(vec: Vec<u8>) -> Self {
        if vec.is_empty() {
            return Self::empty();
        }
        let mut vec = vec.into_boxed_slice();
        let data = vec.as_mut_ptr();
        let len = vec.len();
        std::mem::forget(vec);

        Self {
            data,
            len,
            capacity: len,
        }
    }

    /// Creates the null buffer.
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    /// Returns true if the buffer is null.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Converts back to a Vec, consuming the buffer.
    ///
    /// # Safety
    ///
    /// The buffer must have been created by [`LevelKvBuffer::from_vec`].
    pub unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        Vec::from_raw_parts(self.data, self.len, self.capacity)
    }
}

/// Frees a buffer allocated by LevelKV. Freeing the null buffer is a no-op.
///
/// # Safety
///
/// The buffer must have been returned by a LevelKV function and not freed
/// before.
#[no_mangle]
pub unsafe extern "C" fn levelkv_free_buffer(buffer: LevelKvBuffer) {
    drop(buffer.into_vec());
}

/// A string for FFI.
///
/// Null-terminated UTF-8 string. Memory owned by Rust.
/// Call `levelkv_free_string` to release.
#[repr(C)]
#[derive(Debug)]
pub struct LevelKvString {
    /// Pointer to null-terminated string, null when absent.
    pub ptr: *mut c_char,
    /// Length (not including null terminator).
    pub len: usize,
}

impl LevelKvString {
    /// Creates an FFI string. Returns `None` if `s` contains a NUL byte.
    pub fn from_str(s: &str) -> Option<Self> {
        let cstring = CString::new(s).ok()?;
        let len = cstring.as_bytes().len();
        let ptr = cstring.into_raw();

        Some(Self { ptr, len })
    }

    /// Creates the null string.
    pub fn empty() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }

    /// Returns true if the string is null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Converts to a Rust string slice.
    ///
    /// # Safety
    ///
    /// The pointer must be null or valid.
    pub unsafe fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        CStr::from_ptr(self.ptr).to_str().ok()
    }
}

/// Frees a string allocated by LevelKV. Freeing the null string is a no-op.
///
/// # Safety
///
/// The string must have been returned by a LevelKV function and not freed
/// before.
#[no_mangle]
pub unsafe extern "C" fn levelkv_free_string(string: LevelKvString) {
    if !string.ptr.is_null() {
        drop(CString::from_raw(string.ptr));
    }
}

/// Borrows `len` bytes at `data` for the rest of the call.
///
/// Null with a zero length is the empty slice; null with a non-zero length
/// is rejected.
///
/// # Safety
///
/// A non-null `data` must point to `len` readable bytes that stay valid and
/// unmodified for `'a`.
pub(crate) unsafe fn borrow_bytes<'a>(
    data: *const u8,
    len: usize,
    what: &'static str,
) -> FfiResult<&'a [u8]> {
    if data.is_null() {
        if len == 0 {
            return Ok(&[]);
        }
        return Err(FfiError::InvalidArgument(format!(
            "{what} is null but its length is {len}"
        )));
    }
    Ok(std::slice::from_raw_parts(data, len))
}

/// Borrows a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string valid for `'a`.
pub(crate) unsafe fn borrow_str<'a>(ptr: *const c_char, what: &'static str) -> FfiResult<&'a str> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer(what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| FfiError::InvalidArgument(format!("{what} is not valid UTF-8")))
}

/// Borrows a NUL-terminated UTF-8 path.
///
/// # Safety
///
/// Same as [`borrow_str`].
pub(crate) unsafe fn borrow_path<'a>(ptr: *const c_char) -> FfiResult<&'a Path> {
    borrow_str(ptr, "path").map(Path::new)
}

/// Writes `value` to `out`, or null buffer when absent.
///
/// # Safety
///
/// `out` must be valid for writes.
pub(crate) unsafe fn write_buffer(out: *mut LevelKvBuffer, value: Option<Vec<u8>>) {
    *out = value.map_or_else(LevelKvBuffer::empty, LevelKvBuffer::from_vec);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_from_vec() {
        let buffer = LevelKvBuffer::from_vec(vec![1u8, 2, 3, 4, 5]);
        assert!(!buffer.is_null());
        assert_eq!(buffer.len, 5);

        // Safety: created from a Vec above
        let back = unsafe { buffer.into_vec() };
        assert_eq!(back, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_vec_becomes_null_buffer() {
        let buffer = LevelKvBuffer::from_vec(Vec::new());
        assert!(buffer.is_null());
        // Safety: freeing the null buffer is a no-op
        unsafe { levelkv_free_buffer(buffer) };
    }

    #[test]
    fn string_round_trip() {
        let s = LevelKvString::from_str("levelkv").unwrap();
        assert_eq!(s.len, 7);
        // Safety: created above
        unsafe {
            assert_eq!(s.as_str(), Some("levelkv"));
            levelkv_free_string(s);
        }
        assert!(LevelKvString::from_str("a\0b").is_none());
        assert!(LevelKvString::empty().is_null());
    }

    #[test]
    fn borrowing_bytes() {
        let data = [9u8, 8, 7];
        // Safety: pointers come from live locals or are null
        unsafe {
            assert_eq!(borrow_bytes(data.as_ptr(), 3, "key").unwrap(), &data);
            assert!(borrow_bytes(std::ptr::null(), 0, "key").unwrap().is_empty());
            assert!(matches!(
                borrow_bytes(std::ptr::null(), 4, "key"),
                Err(FfiError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn borrowing_strings() {
        // Safety: C string literals are NUL-terminated and static
        unsafe {
            assert_eq!(borrow_str(c"name".as_ptr(), "name").unwrap(), "name");
            assert!(matches!(
                borrow_str(std::ptr::null(), "name"),
                Err(FfiError::NullPointer("name"))
            ));
            let bad = [0xFFu8, 0];
            assert!(matches!(
                borrow_str(bad.as_ptr().cast(), "name"),
                Err(FfiError::InvalidArgument(_))
            ));
            assert_eq!(borrow_path(c"/tmp/db".as_ptr()).unwrap(), Path::new("/tmp/db"));
        }
    }
}
