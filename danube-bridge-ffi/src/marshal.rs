//! C-string marshalling at the foreign boundary.
//!
//! Rules enforced here:
//! - foreign pointers are checked for NULL before any dereference;
//! - foreign string contents are copied into owned values immediately, no
//!   foreign pointer survives past the call that received it;
//! - every returned string is freshly allocated and owned by the caller
//!   until released through [`release`] exactly once.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Copy a foreign C string into an owned value. Returns `None` for NULL.
///
/// # Safety
///
/// `ptr`, when non-null, must point at a NUL-terminated string valid for the
/// duration of the call.
pub(crate) unsafe fn owned_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Allocate a caller-owned result string.
pub(crate) fn ret_string(s: impl Into<String>) -> *mut c_char {
    into_raw(s.into().into_bytes())
}

/// Turn a message payload into a caller-owned C string. Payload bytes pass
/// through untouched except interior NULs, which the C string representation
/// cannot carry and which are stripped.
pub(crate) fn payload_string(payload: Vec<u8>) -> *mut c_char {
    into_raw(payload)
}

fn into_raw(mut bytes: Vec<u8>) -> *mut c_char {
    if bytes.contains(&0) {
        bytes.retain(|b| *b != 0);
    }
    // After stripping NULs the conversion cannot fail; the fallback is an
    // empty string.
    CString::new(bytes).unwrap_or_default().into_raw()
}

/// Reclaim a string previously produced by [`ret_string`]/[`payload_string`].
/// NULL is accepted and ignored.
///
/// # Safety
///
/// `ptr` must be NULL or a pointer obtained from this module that has not
/// been released before.
pub(crate) unsafe fn release(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}
