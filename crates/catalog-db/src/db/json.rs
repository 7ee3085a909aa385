//! Helpers for JSON values stored in TEXT columns

use catalog_core::AppError;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Encode a value for a JSON column
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string(value)?)
}

/// Encode an optional value; `None` is stored as SQL NULL
pub fn encode_opt<T: Serialize>(value: Option<&T>) -> Result<Option<String>, AppError> {
    value.map(encode).transpose()
}

/// Encode a list, storing an empty list as SQL NULL
pub fn encode_list<T: Serialize>(values: &[T]) -> Result<Option<String>, AppError> {
    if values.is_empty() {
        Ok(None)
    } else {
        encode(values).map(Some)
    }
}

/// Decode a JSON column. NULL, empty and `null` text decode to `None`; malformed
/// text is an error.
pub fn decode<T: DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw {
        Some(text) if !text.is_empty() && text != "null" => Ok(Some(serde_json::from_str(text)?)),
        _ => Ok(None),
    }
}

/// Decode a JSON column, falling back to the default for NULL or malformed text
pub fn decode_or_default<T: DeserializeOwned + Default>(raw: Option<&str>, column: &str) -> T {
    match decode(raw) {
        Ok(value) => value.unwrap_or_default(),
        Err(error) => {
            tracing::warn!(column, error = %error, "Ignoring malformed JSON column");
            T::default()
        }
    }
}

/// Replace an unset timestamp (the epoch default) with `now`
pub fn or_now(ts: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if ts == DateTime::<Utc>::default() {
        now
    } else {
        ts
    }
}
