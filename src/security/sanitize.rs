//! Input sanitization for gateway tool traffic.
//!
//! Rejects null bytes and strips unsafe control characters (C0/C1 controls,
//! zero-width joiners, BOM, line/paragraph separators) from every string in
//! a tool call's `arguments` before it reaches validation.

use serde_json::Value;

use crate::{Error, Result};

/// Characters that are always rejected (null byte).
const REJECTED_BYTE: u8 = 0x00;

/// Control characters to strip (C0 range excluding common whitespace).
/// We preserve: `\t` (0x09), `\n` (0x0A), `\r` (0x0D).
fn is_unsafe_control(c: char) -> bool {
    let code = c as u32;
    // C0 control characters (0x00-0x1F) minus tab, newline, carriage return
    (code <= 0x1F && code != 0x09 && code != 0x0A && code != 0x0D)
    // C1 control characters (0x80-0x9F) — rarely legitimate in text
    || (0x80..=0x9F).contains(&code)
    // Unicode specials: zero-width chars often used for homograph attacks
    || c == '\u{200B}' // zero-width space
    || c == '\u{200C}' // zero-width non-joiner
    || c == '\u{200D}' // zero-width joiner
    || c == '\u{FEFF}' // byte order mark (when not at start)
    || c == '\u{2028}' // line separator
    || c == '\u{2029}' // paragraph separator
}

/// Check if a string contains null bytes.
fn contains_null_byte(s: &str) -> bool {
    s.as_bytes().contains(&REJECTED_BYTE)
}

/// Sanitize a single string value: reject null bytes, strip unsafe
/// control characters.
///
/// # Errors
///
/// Returns `Error::Protocol` if the string contains null bytes.
fn sanitize_string(s: &str) -> Result<String> {
    if contains_null_byte(s) {
        return Err(Error::Protocol(
            "Input contains null bytes which are not allowed".to_string(),
        ));
    }

    Ok(s.chars().filter(|c| !is_unsafe_control(*c)).collect())
}

/// Recursively sanitize all string values in a JSON value tree.
///
/// # Errors
///
/// Returns `Error::Protocol` if any string contains null bytes.
pub fn sanitize_json_value(value: &Value) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(sanitize_string(s)?)),
        Value::Array(arr) => {
            let sanitized: Result<Vec<Value>> =
                arr.iter().map(sanitize_json_value).collect();
            Ok(Value::Array(sanitized?))
        }
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let clean_key = sanitize_string(key)?;
                let clean_val = sanitize_json_value(val)?;
                sanitized.insert(clean_key, clean_val);
            }
            Ok(Value::Object(sanitized))
        }
        // Numbers, booleans, and null pass through unchanged.
        other => Ok(other.clone()),
    }
}

/// Sanitize an optional JSON value, returning `None` unchanged.
///
/// # Errors
///
/// Returns `Error::Protocol` if any string contains null bytes.
pub fn sanitize_optional_json(value: Option<Value>) -> Result<Option<Value>> {
    match value {
        Some(v) => Ok(Some(sanitize_json_value(&v)?)),
        None => Ok(None),
    }
}
