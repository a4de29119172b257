// ABOUTME: C FFI bindings for the htmlfilter sanitizer.
// ABOUTME: Exposes opaque filter handles and arena-allocated sanitized output to native consumers.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use bumpalo::Bump;
use htmlfilter::HtmlFilter;

/// FFI version constant for ABI compatibility checking.
pub const HTMLFILTER_FFI_VERSION: u32 = 1;

/// Returns the FFI ABI version number.
/// Consumers should check this matches their expected version.
#[no_mangle]
pub extern "C" fn htmlfilter_ffi_version() -> u32 {
    HTMLFILTER_FFI_VERSION
}

// ----------------------------------------------------------------------------
// Error handling
// ----------------------------------------------------------------------------

/// Error codes matching the C ABI HErrorCode enum.
#[repr(u32)]
pub enum HErrorCode {
    Ok = 0,
    Invalid = 1,
    Config = 2,
    Internal = 255,
}

/// UTF-8 string slice for FFI. Not null-terminated.
/// Consumer must not mutate or free it.
#[derive(Copy, Clone)]
#[repr(C)]
pub struct HString {
    pub data: *const u8,
    pub len: usize,
}

impl HString {
    pub const fn empty() -> Self {
        HString {
            data: ptr::null(),
            len: 0,
        }
    }
}

impl Default for HString {
    fn default() -> Self {
        Self::empty()
    }
}

/// FFI error struct matching C ABI HError.
///
/// The message lives in a per-thread buffer and stays valid until the next
/// failing call on the same thread.
#[repr(C)]
pub struct HError {
    pub code: u32,
    pub message: HString,
}

impl HError {
    pub const fn ok() -> Self {
        HError {
            code: HErrorCode::Ok as u32,
            message: HString::empty(),
        }
    }
}

thread_local! {
    static ERROR_ARENA: RefCell<Bump> = RefCell::new(Bump::new());
}

// ----------------------------------------------------------------------------
// Handle and arena types
// ----------------------------------------------------------------------------

/// Opaque filter handle. Immutable once created; may be shared between
/// threads by the caller.
pub struct HFilter {
    filter: HtmlFilter,
}

/// Arena holding one sanitized output string.
pub struct HResultArena {
    #[allow(dead_code)]
    bump: Bump,
    output: HString,
}

// ----------------------------------------------------------------------------
// Helper functions
// ----------------------------------------------------------------------------

/// Copies a string into the arena and returns an HString pointing to it.
fn copy_str_to_arena(bump: &Bump, s: &str) -> HString {
    if s.is_empty() {
        return HString::empty();
    }
    let bytes = bump.alloc_slice_copy(s.as_bytes());
    HString {
        data: bytes.as_ptr(),
        len: bytes.len(),
    }
}

/// Sets out_err with the given code and message. No-op if out_err is null.
unsafe fn set_error(out_err: *mut HError, code: HErrorCode, message: &str) {
    if out_err.is_null() {
        return;
    }
    let message = ERROR_ARENA.with(|arena| {
        let mut bump = arena.borrow_mut();
        bump.reset();
        copy_str_to_arena(&bump, message)
    });
    (*out_err).code = code as u32;
    (*out_err).message = message;
}

/// Sets out_err to success. No-op if out_err is null.
unsafe fn set_success(out_err: *mut HError) {
    if !out_err.is_null() {
        (*out_err).code = HErrorCode::Ok as u32;
        (*out_err).message = HString::empty();
    }
}

/// Borrows `len` bytes at `data` as UTF-8. A null pointer is rejected even
/// when `len` is zero.
unsafe fn str_arg<'a>(data: *const u8, len: usize, what: &str) -> Result<&'a str, String> {
    if data.is_null() {
        return Err(format!("{what} is null"));
    }
    let bytes = std::slice::from_raw_parts(data, len);
    std::str::from_utf8(bytes).map_err(|_| format!("{what} is not valid UTF-8"))
}

// ----------------------------------------------------------------------------
// Filter handles
// ----------------------------------------------------------------------------

/// Creates a filter with the default whitelist. Caller must free the
/// returned handle via htmlfilter_free.
#[no_mangle]
pub extern "C" fn htmlfilter_new(always_make_tags: bool) -> *mut HFilter {
    match panic::catch_unwind(|| HtmlFilter::new(always_make_tags)) {
        Ok(filter) => Box::into_raw(Box::new(HFilter { filter })),
        Err(_) => ptr::null_mut(),
    }
}

/// Creates a filter from a JSON configuration document.
///
/// # Arguments
/// * `json` - configuration bytes (UTF-8)
/// * `json_len` - length of the configuration in bytes
/// * `out_err` - output error struct (may be null)
///
/// # Returns
/// Filter handle on success, null on failure with out_err describing why.
///
/// # Safety
/// `json` must point to `json_len` readable bytes. Caller must free the
/// returned handle via htmlfilter_free.
#[no_mangle]
pub unsafe extern "C" fn htmlfilter_from_json(
    json: *const u8,
    json_len: usize,
    out_err: *mut HError,
) -> *mut HFilter {
    let json_str = match str_arg(json, json_len, "json") {
        Ok(s) => s,
        Err(msg) => {
            set_error(out_err, HErrorCode::Invalid, &msg);
            return ptr::null_mut();
        }
    };

    match panic::catch_unwind(|| HtmlFilter::from_json(json_str)) {
        Ok(Ok(filter)) => {
            set_success(out_err);
            Box::into_raw(Box::new(HFilter { filter }))
        }
        Ok(Err(config_err)) => {
            set_error(out_err, HErrorCode::Config, &config_err.to_string());
            ptr::null_mut()
        }
        Err(_) => {
            set_error(
                out_err,
                HErrorCode::Internal,
                "internal panic while building filter",
            );
            ptr::null_mut()
        }
    }
}

/// Frees a filter handle.
///
/// # Safety
/// The pointer must have been returned by htmlfilter_new or
/// htmlfilter_from_json and not freed already.
#[no_mangle]
pub unsafe extern "C" fn htmlfilter_free(filter: *mut HFilter) {
    if !filter.is_null() {
        drop(Box::from_raw(filter));
    }
}

// ----------------------------------------------------------------------------
// Filtering
// ----------------------------------------------------------------------------

/// Sanitizes one input. Returns an arena holding the output.
///
/// # Arguments
/// * `filter` - handle from htmlfilter_new / htmlfilter_from_json
/// * `input` - markup bytes (UTF-8); may be empty but not null
/// * `input_len` - length of the input in bytes
/// * `out_err` - output error struct (may be null)
///
/// # Safety
/// `filter` must be a live handle and `input` must point to `input_len`
/// readable bytes. Caller must free the returned arena via
/// htmlfilter_free_result.
#[no_mangle]
pub unsafe extern "C" fn htmlfilter_apply(
    filter: *const HFilter,
    input: *const u8,
    input_len: usize,
    out_err: *mut HError,
) -> *mut HResultArena {
    if filter.is_null() {
        set_error(out_err, HErrorCode::Invalid, "filter is null");
        return ptr::null_mut();
    }
    let input_str = match str_arg(input, input_len, "input") {
        Ok(s) => s,
        Err(msg) => {
            set_error(out_err, HErrorCode::Invalid, &msg);
            return ptr::null_mut();
        }
    };

    let filter = &(*filter).filter;
    match panic::catch_unwind(AssertUnwindSafe(|| filter.filter(input_str))) {
        Ok(output) => {
            let bump = Bump::new();
            let output = copy_str_to_arena(&bump, &output);
            set_success(out_err);
            Box::into_raw(Box::new(HResultArena { bump, output }))
        }
        Err(_) => {
            set_error(
                out_err,
                HErrorCode::Internal,
                "internal panic during filtering",
            );
            ptr::null_mut()
        }
    }
}

/// Returns the sanitized output held by the arena. An empty output (or a null
/// arena) yields a null pointer with zero length.
///
/// # Safety
/// The arena pointer must be null or valid. The returned slice is valid
/// until htmlfilter_free_result is called.
#[no_mangle]
pub unsafe extern "C" fn htmlfilter_result(arena: *const HResultArena) -> HString {
    if arena.is_null() {
        return HString::empty();
    }
    (*arena).output
}

/// Frees the result arena and the output it holds.
///
/// # Safety
/// The arena pointer must have been returned by htmlfilter_apply.
/// After this call, the arena pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn htmlfilter_free_result(arena: *mut HResultArena) {
    if !arena.is_null() {
        drop(Box::from_raw(arena));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_version() {
        assert_eq!(htmlfilter_ffi_version(), 1);
    }

    #[test]
    fn test_hstring_empty() {
        let s = HString::empty();
        assert!(s.data.is_null());
        assert_eq!(s.len, 0);
    }

    #[test]
    fn test_copy_str_to_arena() {
        let bump = Bump::new();
        let hs = copy_str_to_arena(&bump, "<b>x</b>");
        assert!(!hs.data.is_null());
        assert_eq!(hs.len, 8);
        unsafe {
            let slice = std::slice::from_raw_parts(hs.data, hs.len);
            assert_eq!(std::str::from_utf8(slice).unwrap(), "<b>x</b>");
        }
    }

    #[test]
    fn test_error_message_outlives_call() {
        let mut err = HError::ok();
        unsafe {
            set_error(&mut err, HErrorCode::Config, "bad config");
            let slice = std::slice::from_raw_parts(err.message.data, err.message.len);
            assert_eq!(std::str::from_utf8(slice).unwrap(), "bad config");
        }
        assert_eq!(err.code, HErrorCode::Config as u32);
    }

    #[test]
    fn test_str_arg_rejects_null_and_bad_utf8() {
        unsafe {
            assert!(str_arg(ptr::null(), 0, "input").is_err());
            let bad = [0xffu8, 0xfe];
            assert_eq!(
                str_arg(bad.as_ptr(), bad.len(), "input").unwrap_err(),
                "input is not valid UTF-8"
            );
            let empty: [u8; 0] = [];
            assert_eq!(str_arg(empty.as_ptr(), 0, "input").unwrap(), "");
        }
    }
}
