//! The Validator middleware: parameter coercion followed by a JSON Schema
//! check, run between tool lookup and handler invocation.

use jsonschema::Draft;
use serde_json::Value;

use crate::error::AidisError;
use crate::registry::ToolEntry;

/// Known array-typed fields that callers sometimes pre-serialize as a JSON
/// string (a transport quirk, not a schema violation). If the string parses
/// to a JSON array it replaces the value; otherwise it is left untouched and
/// the schema check below will reject it if the shape is actually wrong.
const KNOWN_ARRAY_FIELDS: &[&str] = &[
    "tags",
    "aliases",
    "contextTags",
    "dependencies",
    "capabilities",
    "alternativesConsidered",
    "affectedComponents",
    "contextRefs",
    "taskRefs",
    "paths",
];

/// Known numeric fields subject to the same string-encoded quirk.
const KNOWN_NUMERIC_FIELDS: &[&str] = &[
    "limit",
    "maxDepth",
    "relevanceScore",
    "confidenceScore",
    "priority",
    "estimatedHours",
    "actualHours",
    "hours_back",
    "confidenceThreshold",
    "minConfidence",
];

/// Coerce known array/numeric fields that arrived as strings, then validate
/// the result against the tool's declared input schema.
pub fn validate(tool: &ToolEntry, raw_args: Value) -> Result<Value, AidisError> {
    let coerced = coerce(raw_args);
    check_schema(tool, &coerced)?;
    Ok(coerced)
}

fn coerce(mut args: Value) -> Value {
    let Some(obj) = args.as_object_mut() else {
        return args;
    };

    for field in KNOWN_ARRAY_FIELDS {
        if let Some(value) = obj.get(*field) {
            if let Some(s) = value.as_str() {
                if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
                    obj.insert((*field).to_string(), parsed);
                }
            }
        }
    }

    for field in KNOWN_NUMERIC_FIELDS {
        if let Some(value) = obj.get(*field) {
            if let Some(s) = value.as_str() {
                if let Ok(n) = s.parse::<f64>() {
                    if n.is_finite() {
                        if let Some(num) = serde_json::Number::from_f64(n) {
                            obj.insert((*field).to_string(), Value::Number(num));
                        }
                    }
                }
            }
        }
    }

    args
}

fn check_schema(tool: &ToolEntry, args: &Value) -> Result<(), AidisError> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&tool.tool.input_schema)
        .map_err(|e| AidisError::Internal(format!("invalid schema for {}: {e}", tool.tool.name)))?;

    let messages: Vec<String> = compiled.iter_errors(args).map(|e| e.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(AidisError::InvalidParams(format!(
            "{}: {}",
            tool.tool.name,
            messages.join("; ")
        )))
    }
}
