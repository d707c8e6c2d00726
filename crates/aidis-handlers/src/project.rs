//! Project handlers: lifecycle plus the ambient current-project lookup
//! every other handler family resolves through.

use serde_json::{json, Value};
use uuid::Uuid;

use aidis_core::cache::StorageGateway;
use aidis_core::types::{Project, ProjectStatus};
use aidis_harness::error::AidisError;

use crate::args::{get_bool_opt, get_obj_opt, get_str, get_str_opt};
use crate::state::AppState;

/// Resolves the project a call should operate on: an explicit id wins,
/// otherwise the caller's ambient current project.
pub(crate) async fn resolve_project(
    state: &AppState,
    caller_id: &str,
    explicit_id: Option<&str>,
) -> Result<Project, AidisError> {
    if let Some(raw) = explicit_id {
        let id = Uuid::parse_str(raw)
            .map_err(|_| AidisError::InvalidParams(format!("'{raw}' is not a valid project id")))?;
        return state
            .storage
            .get_project(id)
            .await?
            .ok_or_else(|| AidisError::NotFound(format!("project '{raw}' not found")));
    }
    state
        .ambient
        .current_project(caller_id, &state.storage)
        .await?
        .ok_or_else(|| AidisError::NotFound("no current project; run project_create first".into()))
}

async fn find_by_name_or_id(storage: &StorageGateway, needle: &str) -> Result<Project, AidisError> {
    if let Some(p) = storage.get_project_by_name(needle).await? {
        return Ok(p);
    }
    if let Ok(id) = Uuid::parse_str(needle) {
        if let Some(p) = storage.get_project(id).await? {
            return Ok(p);
        }
    }
    Err(AidisError::NotFound(format!("project '{needle}' not found")))
}

fn project_json(p: &Project) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "description": p.description,
        "status": match p.status {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
        },
        "gitRepoUrl": p.git_repo_url,
        "rootDirectory": p.root_directory,
        "metadata": p.metadata,
        "createdAt": p.created_at,
        "updatedAt": p.updated_at,
    })
}

pub async fn list(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let include_stats = get_bool_opt(&args, "includeStats")?.unwrap_or(false);
    let projects = state.storage.list_projects().await?;

    let mut out = Vec::with_capacity(projects.len());
    for p in projects {
        let mut row = project_json(&p);
        if include_stats {
            let (total, with_embedding, recent_24h, _) = state.storage.context_stats(p.id).await?;
            row["contextStats"] = json!({
                "total": total,
                "withEmbedding": with_embedding,
                "recent24h": recent_24h,
            });
        }
        out.push(row);
    }
    Ok(json!({"projects": out}))
}

pub async fn create(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let name = get_str(&args, "name")?;
    if name.is_empty() {
        return Err(AidisError::InvalidParams("name must not be empty".into()));
    }
    let mut p = Project::new(name);
    p.description = get_str_opt(&args, "description")?;
    p.git_repo_url = get_str_opt(&args, "gitRepoUrl")?;
    p.root_directory = get_str_opt(&args, "rootDirectory")?;
    p.metadata = get_obj_opt(&args, "metadata")?;
    state.storage.create_project(&p).await?;
    Ok(project_json(&p))
}

pub async fn switch(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let target = get_str(&args, "project")?;
    let project = state
        .ambient
        .project_switch(caller_id, &target, &state.storage)
        .await?;
    Ok(project_json(&project))
}

pub async fn current(state: &AppState, caller_id: &str, _args: Value) -> Result<Value, AidisError> {
    let project = state
        .ambient
        .current_project(caller_id, &state.storage)
        .await?
        .ok_or_else(|| AidisError::NotFound("no current project; run project_create first".into()))?;
    Ok(project_json(&project))
}

pub async fn info(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let needle = get_str(&args, "project")?;
    let project = find_by_name_or_id(&state.storage, &needle).await?;
    Ok(project_json(&project))
}

pub async fn delete(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let raw = get_str(&args, "projectId")?;
    let id = Uuid::parse_str(&raw)
        .map_err(|_| AidisError::InvalidParams("projectId is not a valid uuid".into()))?;
    state.storage.delete_project(id).await?;
    Ok(json!({"deleted": true}))
}
