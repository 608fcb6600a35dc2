//! FFI bindings for Empathic Core
//!
//! C-compatible functions for driving a session agent from other languages.
//! All payloads cross the boundary as null-terminated JSON strings; returned
//! strings are allocated here and must be freed with `empathic_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::agent::SessionAgent;
use crate::config::AgentConfig;
use crate::types::{EmotionSnapshot, TranscriptFragment};

// Thread-local storage for the last error message
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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn parse_timestamp(ptr: *const c_char) -> Option<DateTime<Utc>> {
    let raw = cstr_to_string(ptr)?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Opaque handle to a SessionAgent
pub struct SessionAgentHandle {
    agent: SessionAgent,
}

/// Create a new session agent.
///
/// # Safety
/// - `config_json` may be NULL for defaults, otherwise a valid
///   null-terminated JSON string matching the configuration schema.
/// - `timestamp` must be a valid null-terminated RFC 3339 string.
/// - Returns a pointer that must be freed with `empathic_agent_free`, or
///   NULL on error (`empathic_last_error` has the message).
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_new(
    config_json: *const c_char,
    timestamp: *const c_char,
) -> *mut SessionAgentHandle {
    clear_last_error();

    let now = match parse_timestamp(timestamp) {
        Some(t) => t,
        None => {
            set_last_error("Invalid timestamp string");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        AgentConfig::default()
    } else {
        let raw = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(SessionAgentHandle {
        agent: SessionAgent::new(config, now),
    });
    Box::into_raw(handle)
}

/// Free a session agent.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_free(agent: *mut SessionAgentHandle) {
    if !agent.is_null() {
        drop(Box::from_raw(agent));
    }
}

/// Start (or restart) a session.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
/// - `session_id` may be NULL to generate one; `timestamp` must be a valid
///   null-terminated RFC 3339 string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_start(
    agent: *mut SessionAgentHandle,
    session_id: *const c_char,
    timestamp: *const c_char,
) -> i32 {
    clear_last_error();

    if agent.is_null() {
        set_last_error("Null agent pointer");
        return -1;
    }
    let now = match parse_timestamp(timestamp) {
        Some(t) => t,
        None => {
            set_last_error("Invalid timestamp string");
            return -1;
        }
    };

    let handle = &mut *agent;
    handle.agent.start(cstr_to_string(session_id), now);
    0
}

/// Feed one emotion snapshot and return the active suggestions as a JSON
/// array.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
/// - `snapshot_json` must be a valid null-terminated JSON string.
/// - Returns a newly allocated string to free with `empathic_free_string`,
///   or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_handle_snapshot(
    agent: *mut SessionAgentHandle,
    snapshot_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if agent.is_null() {
        set_last_error("Null agent pointer");
        return ptr::null_mut();
    }
    let raw = match cstr_to_string(snapshot_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid snapshot string pointer");
            return ptr::null_mut();
        }
    };
    let snapshot: EmotionSnapshot = match serde_json::from_str(&raw) {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let handle = &mut *agent;
    let active = handle.agent.handle_snapshot(&snapshot);
    match serde_json::to_string(active) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Feed one transcript fragment. Returns the synthesized alert suggestion as
/// JSON, or the string "null" when no alert was raised.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
/// - `fragment_json` must be a valid null-terminated JSON string.
/// - Returns a newly allocated string to free with `empathic_free_string`,
///   or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_handle_transcript(
    agent: *mut SessionAgentHandle,
    fragment_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if agent.is_null() {
        set_last_error("Null agent pointer");
        return ptr::null_mut();
    }
    let raw = match cstr_to_string(fragment_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid fragment string pointer");
            return ptr::null_mut();
        }
    };
    let fragment: TranscriptFragment = match serde_json::from_str(&raw) {
        Ok(f) => f,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let handle = &mut *agent;
    let alert = handle.agent.handle_transcript(&fragment);
    match serde_json::to_string(&alert) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Flag a suggestion as used. Returns 0 on success, non-zero when the id is
/// unknown.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_use_suggestion(
    agent: *mut SessionAgentHandle,
    id: u64,
) -> i32 {
    clear_last_error();
    if agent.is_null() {
        set_last_error("Null agent pointer");
        return -1;
    }
    let handle = &mut *agent;
    if handle.agent.use_suggestion(id) {
        0
    } else {
        set_last_error("Unknown suggestion id");
        -1
    }
}

/// Flag a suggestion as dismissed. Returns 0 on success, non-zero when the
/// id is unknown.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_dismiss_suggestion(
    agent: *mut SessionAgentHandle,
    id: u64,
) -> i32 {
    clear_last_error();
    if agent.is_null() {
        set_last_error("Null agent pointer");
        return -1;
    }
    let handle = &mut *agent;
    if handle.agent.dismiss_suggestion(id) {
        0
    } else {
        set_last_error("Unknown suggestion id");
        -1
    }
}

/// Current session report as JSON.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
/// - Returns a newly allocated string to free with `empathic_free_string`,
///   or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_report(agent: *mut SessionAgentHandle) -> *mut c_char {
    clear_last_error();
    if agent.is_null() {
        set_last_error("Null agent pointer");
        return ptr::null_mut();
    }
    let handle = &*agent;
    match serde_json::to_string(&handle.agent.session_report()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// End the session and return the final report as JSON.
///
/// # Safety
/// - `agent` must be a valid pointer returned by `empathic_agent_new`.
/// - `timestamp` must be a valid null-terminated RFC 3339 string.
/// - Returns a newly allocated string to free with `empathic_free_string`,
///   or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn empathic_agent_end(
    agent: *mut SessionAgentHandle,
    timestamp: *const c_char,
) -> *mut c_char {
    clear_last_error();
    if agent.is_null() {
        set_last_error("Null agent pointer");
        return ptr::null_mut();
    }
    let now = match parse_timestamp(timestamp) {
        Some(t) => t,
        None => {
            set_last_error("Invalid timestamp string");
            return ptr::null_mut();
        }
    };
    let handle = &mut *agent;
    let report = handle.agent.end(now);
    match serde_json::to_string(&report) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by Empathic functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Empathic function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn empathic_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string, valid until the next
///   Empathic function call on this thread. Do NOT free.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn empathic_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn empathic_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn cstring(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn sad_snapshot_json(ts: &str) -> CString {
        cstring(&format!(
            r#"{{"label":"sad","confidence":0.9,"scores":{{"happy":0.0,"sad":0.9,"surprise":0.0,"neutral":0.1}},"timestamp":"{ts}"}}"#
        ))
    }

    #[test]
    fn test_ffi_agent_lifecycle() {
        let ts = cstring("2026-08-29T10:00:00Z");
        unsafe {
            let agent = empathic_agent_new(ptr::null(), ts.as_ptr());
            assert!(!agent.is_null());
            assert_eq!(empathic_agent_start(agent, ptr::null(), ts.as_ptr()), 0);

            let snapshot = sad_snapshot_json("2026-08-29T10:00:10Z");
            let result = empathic_agent_handle_snapshot(agent, snapshot.as_ptr());
            assert!(!result.is_null());
            let json = CStr::from_ptr(result).to_str().unwrap();
            assert!(json.starts_with('['));
            empathic_free_string(result);

            let report = empathic_agent_end(agent, cstring("2026-08-29T10:30:00Z").as_ptr());
            assert!(!report.is_null());
            let json = CStr::from_ptr(report).to_str().unwrap();
            assert!(json.contains("session_id"));
            empathic_free_string(report);

            empathic_agent_free(agent);
        }
    }

    #[test]
    fn test_ffi_transcript_alert() {
        let ts = cstring("2026-08-29T10:00:00Z");
        unsafe {
            let agent = empathic_agent_new(ptr::null(), ts.as_ptr());
            empathic_agent_start(agent, ptr::null(), ts.as_ptr());

            let fragment = cstring(
                r#"{"text":"I want to end my life","speaker":"monitored_party","timestamp":"2026-08-29T10:00:05Z"}"#,
            );
            let result = empathic_agent_handle_transcript(agent, fragment.as_ptr());
            assert!(!result.is_null());
            let json = CStr::from_ptr(result).to_str().unwrap();
            assert!(json.contains("risk_alert"));
            empathic_free_string(result);

            empathic_agent_free(agent);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let ts = cstring("2026-08-29T10:00:00Z");
        unsafe {
            let agent = empathic_agent_new(ptr::null(), ts.as_ptr());
            let bad = cstring("not json");
            let result = empathic_agent_handle_snapshot(agent, bad.as_ptr());
            assert!(result.is_null());

            let error = empathic_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            empathic_agent_free(agent);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = empathic_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
