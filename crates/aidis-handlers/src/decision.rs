//! Decision handlers: recording technical decisions and tracking their
//! outcomes without ever touching the original rationale fields.

use serde_json::{json, Value};
use uuid::Uuid;

use aidis_core::types::{Alternative, Decision, DecisionType, ImpactLevel, OutcomeStatus};
use aidis_harness::error::AidisError;

use crate::args::{get_array_str, get_i64_opt, get_str, get_str_opt};
use crate::project::resolve_project;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 50;

fn parse_impact(s: &str) -> Result<ImpactLevel, AidisError> {
    Ok(match s {
        "low" => ImpactLevel::Low,
        "medium" => ImpactLevel::Medium,
        "high" => ImpactLevel::High,
        "critical" => ImpactLevel::Critical,
        other => return Err(AidisError::InvalidParams(format!("unknown impact level '{other}'"))),
    })
}

fn impact_str(level: ImpactLevel) -> &'static str {
    match level {
        ImpactLevel::Low => "low",
        ImpactLevel::Medium => "medium",
        ImpactLevel::High => "high",
        ImpactLevel::Critical => "critical",
    }
}

fn decision_json(d: &Decision) -> Value {
    json!({
        "id": d.id,
        "projectId": d.project_id,
        "decisionType": d.decision_type.as_str(),
        "title": d.title,
        "description": d.description,
        "rationale": d.rationale,
        "impactLevel": impact_str(d.impact_level),
        "alternativesConsidered": d.alternatives_considered,
        "affectedComponents": d.affected_components,
        "tags": d.tags,
        "outcomeStatus": d.outcome_status.as_str(),
        "outcomeNotes": d.outcome_notes,
        "lessonsLearned": d.lessons_learned,
        "decisionDate": d.decision_date,
    })
}

pub async fn record(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let decision_type_str = get_str(&args, "decisionType")?;
    let decision_type = DecisionType::parse(&decision_type_str)
        .ok_or_else(|| AidisError::InvalidParams(format!("unknown decision type '{decision_type_str}'")))?;
    let title = get_str(&args, "title")?;
    let description = get_str(&args, "description")?;
    let rationale = get_str(&args, "rationale")?;
    let impact_level = parse_impact(&get_str(&args, "impactLevel")?)?;

    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;

    let alternatives: Vec<Alternative> = match args.get("alternativesConsidered") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| AidisError::InvalidParams(format!("invalid alternativesConsidered: {e}")))?,
        None => Vec::new(),
    };
    let affected_components = get_array_str(&args, "affectedComponents")?.unwrap_or_default();
    let tags = get_array_str(&args, "tags")?.unwrap_or_default();

    let d = Decision {
        id: Uuid::new_v4(),
        project_id: project.id,
        decision_type,
        title,
        description,
        rationale,
        impact_level,
        alternatives_considered: alternatives,
        problem_statement: None,
        affected_components,
        tags,
        outcome_status: OutcomeStatus::Unknown,
        outcome_notes: None,
        lessons_learned: None,
        decision_date: chrono::Utc::now(),
    };
    state.storage.insert_decision(&d).await?;
    Ok(decision_json(&d))
}

pub async fn search(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let query = get_str_opt(&args, "query")?;
    let limit = get_i64_opt(&args, "limit")?
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT) as u32;

    let mut rows = state.storage.search_decisions(project.id, query, limit).await?;

    if let Some(dt) = get_str_opt(&args, "decisionType")? {
        let dt = DecisionType::parse(&dt)
            .ok_or_else(|| AidisError::InvalidParams(format!("unknown decision type '{dt}'")))?;
        rows.retain(|d| d.decision_type == dt);
    }
    if let Some(il) = get_str_opt(&args, "impactLevel")? {
        let il = parse_impact(&il)?;
        rows.retain(|d| d.impact_level == il);
    }

    let out: Vec<Value> = rows.iter().map(decision_json).collect();
    Ok(json!({"results": out}))
}

pub async fn update(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let decision_id = get_str(&args, "decisionId")?;
    let id = Uuid::parse_str(&decision_id)
        .map_err(|_| AidisError::InvalidParams("decisionId is not a valid uuid".into()))?;

    let outcome_status = match get_str_opt(&args, "outcomeStatus")? {
        Some(s) => Some(
            OutcomeStatus::parse(&s)
                .ok_or_else(|| AidisError::InvalidParams(format!("unknown outcome status '{s}'")))?,
        ),
        None => None,
    };
    let outcome_notes = get_str_opt(&args, "outcomeNotes")?;
    let lessons_learned = get_str_opt(&args, "lessonsLearned")?;

    let updated = state
        .storage
        .update_decision_outcome(id, outcome_status, outcome_notes, lessons_learned)
        .await?;
    if !updated {
        return Err(AidisError::NotFound(format!("decision '{id}' not found")));
    }
    let d = state
        .storage
        .get_decision(id)
        .await?
        .ok_or_else(|| AidisError::NotFound(format!("decision '{id}' not found")))?;
    Ok(decision_json(&d))
}

pub async fn stats(state: &AppState, caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let project_id = get_str_opt(&args, "projectId")?;
    let project = resolve_project(state, caller_id, project_id.as_deref()).await?;
    let (by_type, by_status, by_impact, success_rate) = state.storage.decision_stats(project.id).await?;
    Ok(json!({
        "byType": by_type,
        "byStatus": by_status,
        "byImpact": by_impact,
        "successRate": success_rate,
    }))
}

pub async fn delete(state: &AppState, _caller_id: &str, args: Value) -> Result<Value, AidisError> {
    let decision_id = get_str(&args, "decisionId")?;
    let id = Uuid::parse_str(&decision_id)
        .map_err(|_| AidisError::InvalidParams("decisionId is not a valid uuid".into()))?;
    let deleted = state.storage.delete_decision(id).await?;
    if deleted {
        Ok(json!({"deleted": true}))
    } else {
        Err(AidisError::NotFound(format!("decision '{id}' not found")))
    }
}
