//! Legacy cookie file decoding.
//!
//! Older deployments kept cookies in a flat JSON file: an array of cookie records.
//! Decoding rules:
//! - an empty (or whitespace-only) file holds no cookies,
//! - text that is not JSON at all is a [`PersistenceError::Decode`],
//! - JSON that is not an array is an outdated layout and is discarded with a warning,
//! - individual records that do not decode are skipped with a warning.

use serde_json::Value;

use crate::cookies::Cookie;
use crate::errors::PersistenceError;

/// Decodes the contents of a legacy cookie file into cookie records, in file order.
pub fn decode(contents: &str) -> Result<Vec<Cookie>, PersistenceError> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(contents)?;
    let Value::Array(records) = value else {
        log::warn!("discarding cookies in unrecognized format (expected a JSON array, found {})", kind(&value));
        return Ok(Vec::new());
    };

    let mut cookies = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Cookie>(record) {
            Ok(cookie) => cookies.push(cookie),
            Err(e) => log::warn!("skipping legacy cookie record #{index}: {e}"),
        }
    }
    Ok(cookies)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
