//! Navigation handlers: liveness, status, and the self-describing catalog
//! tools (`aidis_help`, `aidis_explain`, `aidis_examples`).

use serde_json::{json, Value};

use aidis_harness::error::AidisError;

use crate::args::get_str;
use crate::state::AppState;

pub async fn ping(_state: &AppState, _caller_id: &str, _args: Value) -> Result<Value, AidisError> {
    Ok(json!({"pong": true}))
}

pub async fn status(state: &AppState, _caller_id: &str, _args: Value) -> Result<Value, AidisError> {
    let health = state.storage.healthz().await;
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds().max(0);
    Ok(json!({
        "healthy": health.healthy,
        "dbUtilization": health.utilization,
        "activeConnections": health.active,
        "idleConnections": health.idle,
        "uptimeSecs": uptime_secs,
        "toolCount": state.registry.len(),
    }))
}

pub async fn help(state: &AppState, _caller_id: &str, _args: Value) -> Result<Value, AidisError> {
    let categories = state.registry.by_category();
    Ok(json!({"categories": categories}))
}

pub async fn explain(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let tool_name = get_str(&args, "toolName")?;
    let entry = state
        .registry
        .get(&tool_name)
        .ok_or_else(|| AidisError::NotFound(format!("tool '{tool_name}' not found")))?;
    Ok(json!({
        "name": entry.tool.name,
        "description": entry.tool.description,
        "inputSchema": entry.tool.input_schema,
        "category": entry.category.as_str(),
    }))
}

pub async fn examples(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let tool_name = get_str(&args, "toolName")?;
    let entry = state
        .registry
        .get(&tool_name)
        .ok_or_else(|| AidisError::NotFound(format!("tool '{tool_name}' not found")))?;
    Ok(json!({"toolName": tool_name, "example": entry.example}))
}
