//! FFI bindings for InYear
//!
//! C-compatible entry points for host apps that hand over a health-store
//! export as JSON. All strings are null-terminated; returned strings are
//! allocated here and must be released with `inyear_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::config::parse_timezone;
use crate::error::HealthError;
use crate::pipeline::{block_on, daily_from_export, yearly_from_export};
use crate::source::Platform;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller frees with `inyear_free_string`
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn required(ptr: *const c_char, name: &str) -> Result<String, HealthError> {
    cstr_to_string(ptr).ok_or_else(|| HealthError::ParseError(format!("invalid {name} string pointer")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, HealthError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| HealthError::InvalidDate(format!("{raw}: {e}")))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, HealthError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HealthError::InvalidDate(format!("{raw}: {e}")))
}

/// Serialize an FFI result, or record its error and return NULL
fn respond<T: Serialize>(result: Result<T, HealthError>) -> *mut c_char {
    match result.and_then(|value| serde_json::to_string(&value).map_err(HealthError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Summarize one local calendar day of an export and return it as JSON.
///
/// `platform` is `ios` or `android`; `date` is `YYYY-MM-DD`; `timezone` is
/// `UTC`, `local` or a `±HH:MM` offset.
///
/// # Safety
/// - All arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `inyear_free_string`.
/// - Returns NULL on error; call `inyear_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inyear_daily_summary(
    export_json: *const c_char,
    platform: *const c_char,
    date: *const c_char,
    timezone: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let result = (|| {
        let json = required(export_json, "export JSON")?;
        let platform: Platform = required(platform, "platform")?.parse()?;
        let date = parse_date(&required(date, "date")?)?;
        let tz: FixedOffset = parse_timezone(&required(timezone, "timezone")?)?;
        block_on(daily_from_export(&json, platform, date, tz))?
    })();

    respond(result)
}

/// Summarize the elapsed part of `year` and return it as JSON.
///
/// `reference_date` (`YYYY-MM-DD`) may be NULL, in which case weight and sleep
/// are left without data. `now` (RFC 3339) may be NULL to use the current time.
///
/// # Safety
/// - Non-NULL arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `inyear_free_string`.
/// - Returns NULL on error; call `inyear_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inyear_yearly_summary(
    export_json: *const c_char,
    platform: *const c_char,
    year: i32,
    reference_date: *const c_char,
    now: *const c_char,
    timezone: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let result = (|| {
        let json = required(export_json, "export JSON")?;
        let platform: Platform = required(platform, "platform")?.parse()?;
        let reference_date = cstr_to_string(reference_date)
            .map(|raw| parse_date(&raw))
            .transpose()?;
        let now = match cstr_to_string(now) {
            Some(raw) => parse_instant(&raw)?,
            None => Utc::now(),
        };
        let tz = parse_timezone(&required(timezone, "timezone")?)?;
        block_on(yearly_from_export(&json, platform, year, reference_date, now, tz))?
    })();

    respond(result)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by InYear functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an InYear function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn inyear_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - The returned pointer is valid until the next InYear call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if the last call succeeded.
#[no_mangle]
pub unsafe extern "C" fn inyear_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn inyear_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
