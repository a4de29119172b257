// ABOUTME: Integration tests for the htmlfilter FFI functions.
// ABOUTME: Tests handle creation, filtering through the C ABI, error codes and arena ownership.

use std::ptr;
use std::slice;
use std::str;

use htmlfilter_ffi::{
    htmlfilter_apply, htmlfilter_free, htmlfilter_free_result, htmlfilter_from_json,
    htmlfilter_new, htmlfilter_result, HError, HErrorCode, HString,
};

/// Helper to convert an HString to a &str for assertions.
unsafe fn hstring_to_str<'a>(hs: HString) -> &'a str {
    if hs.data.is_null() || hs.len == 0 {
        return "";
    }
    let slice = slice::from_raw_parts(hs.data, hs.len);
    str::from_utf8(slice).unwrap_or("")
}

/// Runs one input through the filter and returns the owned output.
unsafe fn apply(filter: *const htmlfilter_ffi::HFilter, input: &str) -> String {
    let mut err = HError {
        code: HErrorCode::Internal as u32,
        message: HString::empty(),
    };
    let arena = htmlfilter_apply(filter, input.as_ptr(), input.len(), &mut err);
    assert!(!arena.is_null(), "arena should not be null on success");
    assert_eq!(err.code, HErrorCode::Ok as u32);
    let output = hstring_to_str(htmlfilter_result(arena)).to_string();
    htmlfilter_free_result(arena);
    output
}

#[test]
fn test_default_filter() {
    unsafe {
        let filter = htmlfilter_new(true);
        assert!(!filter.is_null());

        assert_eq!(apply(filter, "<b>hello"), "<b>hello</b>");
        assert_eq!(
            apply(filter, r#"<a href="javascript:foo">bar</a>"#),
            r##"<a href="#foo">bar</a>"##
        );
        assert_eq!(apply(filter, "foo<b"), "foo");

        htmlfilter_free(filter);
    }
}

#[test]
fn test_strict_filter() {
    unsafe {
        let filter = htmlfilter_new(false);
        assert_eq!(apply(filter, "foo<b"), "foo&lt;b");
        htmlfilter_free(filter);
    }
}

#[test]
fn test_empty_input_is_valid() {
    unsafe {
        let filter = htmlfilter_new(true);
        let mut err = HError::ok();
        let empty = "";
        let arena = htmlfilter_apply(filter, empty.as_ptr(), 0, &mut err);

        assert!(!arena.is_null());
        assert_eq!(err.code, HErrorCode::Ok as u32);
        let out = htmlfilter_result(arena);
        assert!(out.data.is_null());
        assert_eq!(out.len, 0);

        htmlfilter_free_result(arena);
        htmlfilter_free(filter);
    }
}

#[test]
fn test_null_input_is_invalid() {
    unsafe {
        let filter = htmlfilter_new(true);
        let mut err = HError::ok();
        let arena = htmlfilter_apply(filter, ptr::null(), 0, &mut err);

        assert!(arena.is_null());
        assert_eq!(err.code, HErrorCode::Invalid as u32);
        assert_eq!(hstring_to_str(err.message), "input is null");

        htmlfilter_free(filter);
    }
}

#[test]
fn test_null_filter_is_invalid() {
    unsafe {
        let mut err = HError::ok();
        let input = "<b>x</b>";
        let arena = htmlfilter_apply(ptr::null(), input.as_ptr(), input.len(), &mut err);

        assert!(arena.is_null());
        assert_eq!(err.code, HErrorCode::Invalid as u32);
        assert_eq!(hstring_to_str(err.message), "filter is null");
    }
}

#[test]
fn test_invalid_utf8_input() {
    unsafe {
        let filter = htmlfilter_new(true);
        let mut err = HError::ok();
        let bad = [b'<', b'b', b'>', 0xff];
        let arena = htmlfilter_apply(filter, bad.as_ptr(), bad.len(), &mut err);

        assert!(arena.is_null());
        assert_eq!(err.code, HErrorCode::Invalid as u32);
        assert!(hstring_to_str(err.message).contains("UTF-8"));

        htmlfilter_free(filter);
    }
}

#[test]
fn test_null_out_err_is_tolerated() {
    unsafe {
        let filter = htmlfilter_new(true);
        let arena = htmlfilter_apply(filter, ptr::null(), 0, ptr::null_mut());
        assert!(arena.is_null());
        htmlfilter_free(filter);
    }
}

#[test]
fn test_from_json() {
    let json = r#"{ "allowed": "p;br", "self_closing": "br", "disallowed": "script" }"#;
    unsafe {
        let mut err = HError {
            code: HErrorCode::Internal as u32,
            message: HString::empty(),
        };
        let filter = htmlfilter_from_json(json.as_ptr(), json.len(), &mut err);

        assert!(!filter.is_null());
        assert_eq!(err.code, HErrorCode::Ok as u32);
        assert_eq!(
            apply(filter, "<p>a<br><script>x</script></p><b>c</b>"),
            "<p>a<br /></p>c"
        );

        htmlfilter_free(filter);
    }
}

#[test]
fn test_from_json_config_error() {
    let json = r#"{ "self_closing": "b" }"#;
    unsafe {
        let mut err = HError::ok();
        let filter = htmlfilter_from_json(json.as_ptr(), json.len(), &mut err);

        assert!(filter.is_null());
        assert_eq!(err.code, HErrorCode::Config as u32);
        assert!(hstring_to_str(err.message).contains("tag `b`"));
    }
}

#[test]
fn test_from_json_malformed() {
    let json = "{ not json";
    unsafe {
        let mut err = HError::ok();
        let filter = htmlfilter_from_json(json.as_ptr(), json.len(), &mut err);

        assert!(filter.is_null());
        assert_eq!(err.code, HErrorCode::Config as u32);
        assert!(!hstring_to_str(err.message).is_empty());
    }
}

#[test]
fn test_result_outlives_filter() {
    unsafe {
        let filter = htmlfilter_new(true);
        let input = "<em>kept";
        let arena = htmlfilter_apply(filter, input.as_ptr(), input.len(), ptr::null_mut());
        htmlfilter_free(filter);

        assert_eq!(hstring_to_str(htmlfilter_result(arena)), "<em>kept</em>");
        htmlfilter_free_result(arena);
    }
}

#[test]
fn test_free_null_is_noop() {
    unsafe {
        htmlfilter_free(ptr::null_mut());
        htmlfilter_free_result(ptr::null_mut());
        let out = htmlfilter_result(ptr::null());
        assert!(out.data.is_null());
    }
}
