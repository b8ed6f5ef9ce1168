//! FFI interface for foreign pipeline engines
//!
//! Exposes the per-product join so a distributed engine (or any C caller)
//! can group records by product id itself and hand each group over as
//! JSON. All strings cross the boundary as null-terminated UTF-8 JSON.

use serde::Serialize;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::config::JoinConfig;
use crate::engine::drop_lone_surrogates;
use crate::error::Result;
use crate::joiner::{join_product, OutputRecord};
use crate::labels::ProductLabels;
use crate::metadata::RawProductRecord;
use crate::stats::Statistics;

/// Result struct returned to C callers
/// Both pointers are owned by Rust and must be freed via mave_free_result
#[repr(C)]
pub struct ProcessResultFFI {
    /// JSON-serialized [`ProcessedProduct`] (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if processing failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Everything one product contributes to a run
#[derive(Debug, Serialize)]
pub struct ProcessedProduct {
    pub positive: Option<OutputRecord>,
    pub negative: Option<OutputRecord>,
    pub statistics: Statistics,
}

/// Joins one product given as JSON and returns the result as JSON.
///
/// `labels_json` holds `{"positive": [...], "negative": [...]}` label
/// records for the product; either list may be omitted.
pub fn process_product_json(record_json: &str, labels_json: &str, config: &JoinConfig) -> Result<String> {
    let (record_json, dropped) = drop_lone_surrogates(record_json.as_bytes());
    let record: RawProductRecord = serde_json::from_slice(&record_json)?;
    let labels: ProductLabels = serde_json::from_str(labels_json)?;

    let mut statistics = Statistics::default();
    if dropped > 0 {
        statistics.run.unicode_repairs += 1;
    }
    let joined = join_product(&record, &labels, config, &mut statistics);
    let processed = ProcessedProduct {
        positive: joined.positive,
        negative: joined.negative,
        statistics,
    };
    Ok(serde_json::to_string(&processed)?)
}

/// Join one product record with its labels.
///
/// # Arguments
/// * `record_json` - JSON metadata record (null-terminated)
/// * `labels_json` - JSON object with `positive` and `negative` label lists (null-terminated)
/// * `config_json` - JSON join configuration, or null for defaults
///
/// # Returns
/// ProcessResultFFI with either json_ptr set (success) or error_ptr set (failure)
///
/// # Safety
/// - Non-null pointers must be valid null-terminated C strings
/// - Caller must free the result via `mave_free_result`
#[no_mangle]
pub unsafe extern "C" fn mave_process_product(
    record_json: *const c_char,
    labels_json: *const c_char,
    config_json: *const c_char,
) -> ProcessResultFFI {
    let record = match read_str(record_json, "record JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };
    let labels = match read_str(labels_json, "labels JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };

    let config = if config_json.is_null() {
        JoinConfig::default()
    } else {
        let text = match read_str(config_json, "config JSON") {
            Ok(s) => s,
            Err(msg) => return make_error_result(&msg),
        };
        match serde_json::from_str(text) {
            Ok(c) => c,
            Err(e) => return make_error_result(&format!("Failed to parse config JSON: {}", e)),
        }
    };

    match process_product_json(record, labels, &config) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ProcessResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Free a ProcessResultFFI returned by mave_process_product
///
/// # Safety
/// - `result` must have been returned by `mave_process_product`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn mave_free_result(result: ProcessResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> std::result::Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {}", what))
}

// Helper to create error result
fn make_error_result(msg: &str) -> ProcessResultFFI {
    let error_ptr = CString::new(msg.replace('\0', " "))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut());
    ProcessResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr,
    }
}
