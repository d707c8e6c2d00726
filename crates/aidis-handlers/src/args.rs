//! Small, defensive accessors over a validated JSON-RPC argument object.
//! The Validator has already checked types against each tool's schema, so
//! these only need to guard against a field genuinely being absent.

use serde_json::Value;

use aidis_harness::error::AidisError;

pub fn get_str(args: &Value, key: &str) -> Result<String, AidisError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AidisError::InvalidParams(format!("'{key}' is required")))
}

pub fn get_str_opt(args: &Value, key: &str) -> Result<Option<String>, AidisError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| AidisError::InvalidParams(format!("'{key}' must be a string"))),
    }
}

pub fn get_bool_opt(args: &Value, key: &str) -> Result<Option<bool>, AidisError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| AidisError::InvalidParams(format!("'{key}' must be a boolean"))),
    }
}

pub fn get_i64_opt(args: &Value, key: &str) -> Result<Option<i64>, AidisError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| AidisError::InvalidParams(format!("'{key}' must be an integer"))),
    }
}

pub fn get_f64_opt(args: &Value, key: &str) -> Result<Option<f64>, AidisError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| AidisError::InvalidParams(format!("'{key}' must be a number"))),
    }
}

pub fn get_obj_opt(args: &Value, key: &str) -> Result<Option<Value>, AidisError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v.clone())),
        Some(_) => Err(AidisError::InvalidParams(format!("'{key}' must be an object"))),
    }
}

/// Arrays of strings. By the time a handler sees them, coercion has already
/// turned any known pre-serialized array field into a native JSON array;
/// this only rejects an array whose elements aren't strings.
pub fn get_array_str(args: &Value, key: &str) -> Result<Option<Vec<String>>, AidisError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| AidisError::InvalidParams(format!("'{key}' items must be strings")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(AidisError::InvalidParams(format!("'{key}' must be an array"))),
    }
}
