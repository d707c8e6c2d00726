//! Context handlers: persisting and retrieving development context rows,
//! the embedding-backed "memory" the rest of the catalog builds on.

use serde_json::{json, Value};
use uuid::Uuid;

use aidis_core::cache::ContextSearchFilter;
use aidis_core::types::{Context, ContextType, MAX_CONTEXT_TAGS};
use aidis_harness::error::AidisError;

use crate::args::{get_array_str, get_f64_opt, get_i64_opt, get_obj_opt, get_str, get_str_opt};
use crate::project::resolve_project;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const MAX_SEARCH_LIMIT: i64 = 50;
const DEFAULT_RECENT_LIMIT: i64 = 5;
const MAX_RECENT_LIMIT: i64 = 20;

fn parse_context_type(s: &str) -> Result<ContextType, AidisError> {
    ContextType::parse(s).ok_or_else(|| AidisError::InvalidParams(format!("unknown context type '{s}'")))
}

pub async fn store(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let content = get_str(&args, "content")?;
    if content.is_empty() || content.chars().count() > 10_000 {
        return Err(AidisError::InvalidParams(
            "content must be between 1 and 10000 characters".into(),
        ));
    }
    let context_type = parse_context_type(&get_str(&args, "type")?)?;
    let tags = get_array_str(&args, "tags")?.unwrap_or_default();
    if tags.len() > MAX_CONTEXT_TAGS {
        return Err(AidisError::InvalidParams("at most 20 tags are allowed".into()));
    }

    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;

    let session_id = match get_str_opt(&args, "sessionId")? {
        Some(raw) => Some(
            Uuid::parse_str(&raw)
                .map_err(|_| AidisError::InvalidParams(format!("'{raw}' is not a valid session id")))?,
        ),
        None => {
            let session = state.ambient.ensure_session(caller_id, &state.storage).await?;
            Some(session.id)
        }
    };

    let mut ctx = Context::new(project.id, context_type, content);
    ctx.session_id = session_id;
    ctx.tags = tags;
    if let Some(score) = get_f64_opt(&args, "relevanceScore")? {
        ctx.relevance_score = score as i32;
    }
    ctx.metadata = get_obj_opt(&args, "metadata")?;
    ctx.embedding = Some(state.embedder.embed(&ctx.content));

    state.storage.insert_context(&ctx).await?;
    if let Some(session_id) = ctx.session_id {
        state.storage.increment_session_context_count(session_id).await?;
    }

    Ok(json!({
        "id": ctx.id,
        "projectId": ctx.project_id,
        "sessionId": ctx.session_id,
        "type": context_type.as_str(),
        "content": ctx.content,
        "tags": ctx.tags,
        "relevanceScore": ctx.relevance_score,
        "createdAt": ctx.created_at,
    }))
}

pub async fn search(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let query = get_str(&args, "query")?;
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;

    let limit = get_i64_opt(&args, "limit")?
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT) as u32;
    let min_similarity_pct = get_f64_opt(&args, "minSimilarity")?.unwrap_or(0.0);
    let min_similarity = ((min_similarity_pct / 100.0) as f32).clamp(0.0, 1.0);

    let context_type = match get_str_opt(&args, "type")? {
        Some(s) => Some(parse_context_type(&s)?),
        None => None,
    };
    let tags = get_array_str(&args, "tags")?.unwrap_or_default();

    let embedding = state.embedder.embed(&query);
    let hits = state
        .storage
        .search_contexts(
            project.id,
            embedding,
            ContextSearchFilter { context_type, tags },
            limit,
            min_similarity,
        )
        .await?;

    let rows: Vec<Value> = hits
        .iter()
        .map(|scored| {
            json!({
                "id": scored.context.id,
                "projectId": scored.context.project_id,
                "type": scored.context.context_type.as_str(),
                "content": scored.context.content,
                "tags": scored.context.tags,
                "createdAt": scored.context.created_at,
                "similarity": scored.similarity * 100.0,
            })
        })
        .collect();
    let count = rows.len();

    Ok(json!({"results": rows, "count": count}))
}

pub async fn get_recent(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let limit = get_i64_opt(&args, "limit")?
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT) as u32;

    let rows = state.storage.get_recent_contexts(project.id, limit).await?;
    let items: Vec<Value> = rows
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "type": c.context_type.as_str(),
                "content": c.content,
                "tags": c.tags,
                "createdAt": c.created_at,
            })
        })
        .collect();
    Ok(json!({"results": items}))
}

pub async fn stats(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let (total, with_embedding, recent_24h, per_type) = state.storage.context_stats(project.id).await?;
    Ok(json!({
        "total": total,
        "withEmbedding": with_embedding,
        "recent24h": recent_24h,
        "byType": per_type
            .into_iter()
            .map(|(type_name, count)| json!({"type": type_name, "count": count}))
            .collect::<Vec<_>>(),
    }))
}

pub async fn delete(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let context_id = get_str(&args, "contextId")?;
    let project_id = get_str(&args, "projectId")?;
    let context_id = Uuid::parse_str(&context_id)
        .map_err(|_| AidisError::InvalidParams("contextId is not a valid uuid".into()))?;
    let project_id = Uuid::parse_str(&project_id)
        .map_err(|_| AidisError::InvalidParams("projectId is not a valid uuid".into()))?;

    let deleted = state.storage.delete_context(context_id, project_id).await?;
    if deleted {
        Ok(json!({"deleted": true}))
    } else {
        Err(AidisError::NotFound(format!(
            "context '{context_id}' not found in project '{project_id}'"
        )))
    }
}
