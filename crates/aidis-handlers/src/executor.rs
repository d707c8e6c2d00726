//! The Core Executor: the single chokepoint both transports call through.
//! Looks the tool up in the registry, validates its arguments, dispatches to
//! the matching handler, and converts anything that goes wrong -- including
//! a handler panic -- into a structured [`AidisError`].

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use aidis_harness::error::{new_correlation_id, AidisError};
use aidis_harness::mcp::ToolCallResult;
use aidis_harness::validator::validate;

use crate::state::AppState;
use crate::{composite, context, decision, navigation, project, task};

pub struct CoreExecutor {
    state: Arc<AppState>,
}

impl CoreExecutor {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Runs one tool call end to end, returning the correlation id used for
    /// this call alongside the result so callers can log/echo it.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        caller_id: &str,
        correlation_id: Option<String>,
    ) -> (String, Result<ToolCallResult, AidisError>) {
        let correlation_id = correlation_id.unwrap_or_else(new_correlation_id);
        let result = self.execute_inner(tool_name, args, caller_id).await;
        if let Err(ref e) = result {
            warn!(tool = tool_name, correlation_id, error = %e, "tool call failed");
        }
        (correlation_id, result)
    }

    async fn execute_inner(
        &self,
        tool_name: &str,
        raw_args: Value,
        caller_id: &str,
    ) -> Result<ToolCallResult, AidisError> {
        let entry = self
            .state
            .registry
            .get(tool_name)
            .ok_or_else(|| AidisError::NotFound(format!("tool '{tool_name}' not found")))?;
        let args = validate(entry, raw_args)?;

        let state = Arc::clone(&self.state);
        let tool_name = tool_name.to_string();
        let caller_id = caller_id.to_string();
        let value = tokio::spawn(async move { dispatch(&state, &tool_name, &caller_id, args).await })
            .await
            .map_err(|join_err| AidisError::Internal(format!("handler panicked: {join_err}")))??;

        let text = serde_json::to_string(&value)
            .map_err(|e| AidisError::Internal(format!("failed to serialize tool result: {e}")))?;
        Ok(ToolCallResult::text(text))
    }
}

/// Routes a validated call to its handler. Exhaustive over the registry's
/// 31 tool names so an unmatched arm is a compile-time error.
async fn dispatch(state: &AppState, tool_name: &str, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    match tool_name {
        "aidis_ping" => navigation::ping(state, caller_id, args).await,
        "aidis_status" => navigation::status(state, caller_id, args).await,
        "aidis_help" => navigation::help(state, caller_id, args).await,
        "aidis_explain" => navigation::explain(state, caller_id, args).await,
        "aidis_examples" => navigation::examples(state, caller_id, args).await,

        "context_store" => context::store(state, caller_id, args).await,
        "context_search" => context::search(state, caller_id, args).await,
        "context_get_recent" => context::get_recent(state, caller_id, args).await,
        "context_stats" => context::stats(state, caller_id, args).await,
        "context_delete" => context::delete(state, caller_id, args).await,

        "project_list" => project::list(state, caller_id, args).await,
        "project_create" => project::create(state, caller_id, args).await,
        "project_switch" => project::switch(state, caller_id, args).await,
        "project_current" => project::current(state, caller_id, args).await,
        "project_info" => project::info(state, caller_id, args).await,
        "project_delete" => project::delete(state, caller_id, args).await,

        "decision_record" => decision::record(state, caller_id, args).await,
        "decision_search" => decision::search(state, caller_id, args).await,
        "decision_update" => decision::update(state, caller_id, args).await,
        "decision_stats" => decision::stats(state, caller_id, args).await,
        "decision_delete" => decision::delete(state, caller_id, args).await,

        "task_create" => task::create(state, caller_id, args).await,
        "task_list" => task::list(state, caller_id, args).await,
        "task_update" => task::update(state, caller_id, args).await,
        "task_details" => task::details(state, caller_id, args).await,
        "task_bulk_update" => task::bulk_update(state, caller_id, args).await,
        "task_progress_summary" => task::progress_summary(state, caller_id, args).await,
        "task_delete" => task::delete(state, caller_id, args).await,

        "smart_search" => composite::smart_search(state, caller_id, args).await,
        "get_recommendations" => composite::get_recommendations(state, caller_id, args).await,
        "project_insights" => composite::project_insights(state, caller_id, args).await,

        other => Err(AidisError::NotFound(format!("tool '{other}' not found"))),
    }
}
