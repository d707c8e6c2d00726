//! Task handlers: work-item tracking, bulk status transitions, and a
//! progress summary aggregator used by the composite recommendation tools.

use std::collections::HashMap;

use serde_json::{json, Value};
use uuid::Uuid;

use aidis_core::types::{Task, TaskPriority, TaskStatus};
use aidis_harness::error::AidisError;

use crate::args::{get_array_str, get_obj_opt, get_str, get_str_opt};
use crate::project::resolve_project;
use crate::state::AppState;

fn parse_status(s: &str) -> Result<TaskStatus, AidisError> {
    TaskStatus::parse(s).ok_or_else(|| AidisError::InvalidParams(format!("unknown task status '{s}'")))
}

fn parse_priority(s: &str) -> Result<TaskPriority, AidisError> {
    TaskPriority::parse(s).ok_or_else(|| AidisError::InvalidParams(format!("unknown task priority '{s}'")))
}

fn task_json(t: &Task) -> Value {
    json!({
        "id": t.id,
        "projectId": t.project_id,
        "title": t.title,
        "description": t.description,
        "taskType": t.task_type,
        "priority": t.priority.as_str(),
        "status": t.status.as_str(),
        "assignee": t.assignee,
        "creator": t.creator,
        "tags": t.tags,
        "dependencies": t.dependencies,
        "metadata": t.metadata,
        "createdAt": t.created_at,
        "startedAt": t.started_at,
        "completedAt": t.completed_at,
    })
}

pub async fn create(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let title = get_str(&args, "title")?;
    let task_type = get_str_opt(&args, "type")?.unwrap_or_else(|| "general".to_string());

    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;

    let mut t = Task::new(project.id, title, task_type);
    t.description = get_str_opt(&args, "description")?;
    t.priority = match get_str_opt(&args, "priority")? {
        Some(p) => parse_priority(&p)?,
        None => TaskPriority::Medium,
    };
    t.assignee = get_str_opt(&args, "assignee")?;
    t.creator = Some(caller_id.to_string());
    t.tags = get_array_str(&args, "tags")?.unwrap_or_default();
    t.dependencies = match get_array_str(&args, "dependencies")? {
        Some(ids) => ids
            .iter()
            .map(|s| Uuid::parse_str(s).map_err(|_| AidisError::InvalidParams(format!("'{s}' is not a valid task id"))))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    t.metadata = get_obj_opt(&args, "metadata")?;

    state.storage.insert_task(&t).await?;
    Ok(task_json(&t))
}

pub async fn list(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let mut tasks = state.storage.list_tasks(project.id).await?;

    if let Some(statuses) = get_array_str(&args, "status")? {
        let wanted = statuses.iter().map(|s| parse_status(s)).collect::<Result<Vec<_>, _>>()?;
        tasks.retain(|t| wanted.contains(&t.status));
    }
    if let Some(priority) = get_str_opt(&args, "priority")? {
        let p = parse_priority(&priority)?;
        tasks.retain(|t| t.priority == p);
    }
    if let Some(assignee) = get_str_opt(&args, "assignee")? {
        tasks.retain(|t| t.assignee.as_deref() == Some(assignee.as_str()));
    }
    if let Some(tags) = get_array_str(&args, "tags")? {
        tasks.retain(|t| tags.iter().any(|wanted| t.tags.contains(wanted)));
    }
    if let Some(phase) = get_str_opt(&args, "phase")? {
        let phase_tag = format!("phase-{phase}");
        tasks.retain(|t| t.tags.contains(&phase_tag));
    }

    let out: Vec<Value> = tasks.iter().map(task_json).collect();
    Ok(json!({"tasks": out}))
}

pub async fn update(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let task_id = get_str(&args, "taskId")?;
    let id = Uuid::parse_str(&task_id)
        .map_err(|_| AidisError::InvalidParams("taskId is not a valid uuid".into()))?;

    let status = match get_str_opt(&args, "status")? {
        Some(s) => Some(parse_status(&s)?),
        None => None,
    };
    let assignee = get_str_opt(&args, "assignee")?;
    let metadata = get_obj_opt(&args, "metadata")?;

    let updated = state.storage.update_task(id, status, assignee, metadata).await?;
    if !updated {
        return Err(AidisError::NotFound(format!("task '{id}' not found")));
    }
    let t = state
        .storage
        .get_task(id)
        .await?
        .ok_or_else(|| AidisError::NotFound(format!("task '{id}' not found")))?;
    Ok(task_json(&t))
}

pub async fn details(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let task_id = get_str(&args, "taskId")?;
    let id = Uuid::parse_str(&task_id)
        .map_err(|_| AidisError::InvalidParams("taskId is not a valid uuid".into()))?;
    let t = state
        .storage
        .get_task(id)
        .await?
        .ok_or_else(|| AidisError::NotFound(format!("task '{id}' not found")))?;
    Ok(task_json(&t))
}

/// All-or-nothing bulk status transition. `StorageGateway::bulk_update_task_status`
/// rejects the whole batch (a `Conflict`) the moment any id is unknown; that
/// is reported back as a structured zero-updated result rather than a
/// transport-level error, per the tool's contract.
pub async fn bulk_update(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let raw_ids = get_array_str(&args, "taskIds")?
        .ok_or_else(|| AidisError::InvalidParams("'taskIds' is required".into()))?;
    let status = parse_status(&get_str(&args, "status")?)?;

    let ids = raw_ids
        .iter()
        .map(|s| Uuid::parse_str(s).map_err(|_| AidisError::InvalidParams(format!("'{s}' is not a valid task id"))))
        .collect::<Result<Vec<_>, _>>()?;
    let total_requested = ids.len();

    match state.storage.bulk_update_task_status(ids, status).await {
        Ok(updated_ids) => Ok(json!({
            "totalRequested": total_requested,
            "successfullyUpdated": updated_ids.len(),
            "failed": total_requested - updated_ids.len(),
            "updatedTaskIds": updated_ids,
        })),
        Err(aidis_core::cache::StorageError::Conflict(_)) => Ok(json!({
            "totalRequested": total_requested,
            "successfullyUpdated": 0,
            "failed": total_requested,
            "updatedTaskIds": Vec::<Uuid>::new(),
        })),
        Err(e) => Err(e.into()),
    }
}

pub async fn progress_summary(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let group_by = get_str_opt(&args, "groupBy")?.unwrap_or_else(|| "status".to_string());
    let tasks = state.storage.list_tasks(project.id).await?;

    let key_of = |t: &Task| -> String {
        match group_by.as_str() {
            "priority" => t.priority.as_str().to_string(),
            "type" => t.task_type.clone(),
            "assignedTo" => t.assignee.clone().unwrap_or_else(|| "unassigned".to_string()),
            "phase" => t
                .tags
                .iter()
                .find_map(|tag| tag.strip_prefix("phase-"))
                .unwrap_or("none")
                .to_string(),
            _ => t.status.as_str().to_string(),
        }
    };

    let mut groups: HashMap<String, (u64, u64)> = HashMap::new();
    for t in &tasks {
        let entry = groups.entry(key_of(t)).or_insert((0, 0));
        entry.0 += 1;
        if t.status == TaskStatus::Completed {
            entry.1 += 1;
        }
    }

    let total = tasks.len() as u64;
    let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count() as u64;
    let groups_json: Vec<Value> = groups
        .into_iter()
        .map(|(key, (count, done))| {
            let pct = if count == 0 { 0.0 } else { (done as f64 / count as f64) * 100.0 };
            json!({"group": key, "total": count, "completed": done, "completionPct": pct})
        })
        .collect();

    let overall_pct = if total == 0 { 0.0 } else { (completed as f64 / total as f64) * 100.0 };
    Ok(json!({
        "groupBy": group_by,
        "groups": groups_json,
        "total": total,
        "completed": completed,
        "completionPct": overall_pct,
    }))
}

pub async fn delete(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let task_id = get_str(&args, "taskId")?;
    let id = Uuid::parse_str(&task_id)
        .map_err(|_| AidisError::InvalidParams("taskId is not a valid uuid".into()))?;
    let deleted = state.storage.delete_task(id).await?;
    if deleted {
        Ok(json!({"deleted": true}))
    } else {
        Err(AidisError::NotFound(format!("task '{id}' not found")))
    }
}
