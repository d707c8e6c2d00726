//! Composite handlers: cross-domain tools that read from more than one
//! storage surface and stitch the results into a single answer.

use serde_json::{json, Value};

use aidis_core::cache::ContextSearchFilter;
use aidis_core::types::{OutcomeStatus, TaskStatus};
use aidis_harness::error::AidisError;

use crate::args::{get_i64_opt, get_str, get_str_opt};
use crate::project::resolve_project;
use crate::state::AppState;

pub async fn smart_search(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let query = get_str(&args, "query")?;
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let limit = get_i64_opt(&args, "limit")?.unwrap_or(10).clamp(1, 50) as u32;

    let embedding = state.embedder.embed(&query);
    let context_hits = state
        .storage
        .search_contexts(project.id, embedding, ContextSearchFilter::default(), limit, 0.0)
        .await?;
    let decision_hits = state.storage.search_decisions(project.id, Some(query.clone()), limit).await?;

    let mut results: Vec<Value> = Vec::new();
    for scored in &context_hits {
        results.push(json!({
            "kind": "context",
            "id": scored.context.id,
            "content": scored.context.content,
            "score": scored.similarity * 100.0,
            "explanation": format!("context of type {} matched '{}' semantically", scored.context.context_type.as_str(), query),
        }));
    }
    for d in &decision_hits {
        results.push(json!({
            "kind": "decision",
            "id": d.id,
            "content": d.title,
            "score": 50.0,
            "explanation": format!("decision title/description matched '{}'", query),
        }));
    }
    results.sort_by(|a, b| {
        b["score"].as_f64().unwrap_or(0.0).partial_cmp(&a["score"].as_f64().unwrap_or(0.0)).unwrap()
    });
    results.truncate(limit as usize);

    Ok(json!({"results": results}))
}

pub async fn get_recommendations(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;

    let tasks = state.storage.list_tasks(project.id).await?;
    let mut recommendations: Vec<Value> = Vec::new();

    let blocked: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Blocked).collect();
    for t in &blocked {
        recommendations.push(json!({
            "kind": "blocked_task",
            "taskId": t.id,
            "title": t.title,
            "explanation": "this task is blocked and has no forward progress",
        }));
    }

    let open_by_priority = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Todo || t.status == TaskStatus::InProgress)
        .max_by_key(|t| t.priority);
    if let Some(t) = open_by_priority {
        recommendations.push(json!({
            "kind": "next_task",
            "taskId": t.id,
            "title": t.title,
            "priority": t.priority.as_str(),
            "explanation": "highest-priority open task",
        }));
    }

    let decisions = state.storage.search_decisions(project.id, None, 50).await?;
    for d in decisions.iter().filter(|d| d.outcome_status == OutcomeStatus::Unknown) {
        recommendations.push(json!({
            "kind": "decision_needs_outcome",
            "decisionId": d.id,
            "title": d.title,
            "explanation": "decision has no recorded outcome yet",
        }));
    }

    Ok(json!({"recommendations": recommendations}))
}

pub async fn project_insights(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;

    let (ctx_total, ctx_with_embedding, ctx_recent_24h, ctx_by_type) =
        state.storage.context_stats(project.id).await?;
    let (decisions_by_type, decisions_by_status, decisions_by_impact, decision_success_rate) =
        state.storage.decision_stats(project.id).await?;
    let tasks = state.storage.list_tasks(project.id).await?;
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();

    Ok(json!({
        "project": {"id": project.id, "name": project.name},
        "context": {
            "total": ctx_total,
            "withEmbedding": ctx_with_embedding,
            "recent24h": ctx_recent_24h,
            "byType": ctx_by_type,
        },
        "decisions": {
            "byType": decisions_by_type,
            "byStatus": decisions_by_status,
            "byImpact": decisions_by_impact,
            "successRate": decision_success_rate,
        },
        "tasks": {
            "total": total_tasks,
            "completed": completed_tasks,
        },
        "explanation": format!(
            "{} of {} tasks completed, decision success rate {:.0}%",
            completed_tasks, total_tasks, decision_success_rate * 100.0
        ),
    }))
}
