use std::sync::Arc;

use serde_json::json;

use aidis_core::cache::StorageGateway;
use aidis_handlers::{AppState, CoreExecutor};

async fn new_executor() -> CoreExecutor {
    let storage = StorageGateway::new_in_memory().await.expect("in-memory db");
    CoreExecutor::new(Arc::new(AppState::new(storage)))
}

#[tokio::test]
async fn unknown_tool_returns_not_found() {
    let exec = new_executor().await;
    let (_cid, result) = exec.execute("does_not_exist", json!({}), "caller-1", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn context_store_then_get_recent_round_trips() {
    let exec = new_executor().await;
    let (_cid, created) = exec
        .execute(
            "project_create",
            json!({"name": "demo-project"}),
            "caller-1",
            None,
        )
        .await;
    assert!(created.is_ok());

    let (_cid, stored) = exec
        .execute(
            "context_store",
            json!({"type": "code", "content": "fn main() {}"}),
            "caller-1",
            None,
        )
        .await;
    assert!(stored.is_ok(), "{:?}", stored.err());

    let (_cid, recent) = exec
        .execute("context_get_recent", json!({}), "caller-1", None)
        .await;
    let recent = recent.expect("get_recent should succeed");
    let text = recent.text_content().unwrap();
    assert!(text.contains("fn main"));
}

#[tokio::test]
async fn project_create_duplicate_name_conflicts() {
    let exec = new_executor().await;
    let (_cid, first) = exec
        .execute("project_create", json!({"name": "dup"}), "caller-1", None)
        .await;
    assert!(first.is_ok());

    let (_cid, second) = exec
        .execute("project_create", json!({"name": "dup"}), "caller-1", None)
        .await;
    assert!(second.is_err());
}

#[tokio::test]
async fn project_switch_failure_leaves_current_project_unchanged() {
    let exec = new_executor().await;
    exec.execute("project_create", json!({"name": "alpha"}), "caller-1", None)
        .await;

    let (_cid, switch_result) = exec
        .execute(
            "project_switch",
            json!({"project": "does-not-exist"}),
            "caller-1",
            None,
        )
        .await;
    assert!(switch_result.is_err());

    let (_cid, current) = exec.execute("project_current", json!({}), "caller-1", None).await;
    let current = current.expect("current project lookup should succeed");
    assert!(current.text_content().unwrap().contains("alpha"));
}

#[tokio::test]
async fn task_bulk_update_is_all_or_nothing_on_unknown_id() {
    let exec = new_executor().await;
    exec.execute("project_create", json!({"name": "tasks-proj"}), "caller-1", None)
        .await;

    let (_cid, created) = exec
        .execute(
            "task_create",
            json!({"title": "first task"}),
            "caller-1",
            None,
        )
        .await;
    let created = created.expect("task_create should succeed");
    let created_json: serde_json::Value = serde_json::from_str(created.text_content().unwrap()).unwrap();
    let task_id = created_json["id"].as_str().unwrap().to_string();

    let (_cid, bulk) = exec
        .execute(
            "task_bulk_update",
            json!({"taskIds": [task_id, "00000000-0000-0000-0000-000000000000"], "status": "completed"}),
            "caller-1",
            None,
        )
        .await;
    let bulk = bulk.expect("bulk update should return a structured result, not an error");
    let body: serde_json::Value = serde_json::from_str(bulk.text_content().unwrap()).unwrap();
    assert_eq!(body["successfullyUpdated"], 0);
    assert_eq!(body["failed"], 2);
}

#[tokio::test]
async fn decision_update_preserves_original_fields() {
    let exec = new_executor().await;
    exec.execute("project_create", json!({"name": "decisions-proj"}), "caller-1", None)
        .await;

    let (_cid, recorded) = exec
        .execute(
            "decision_record",
            json!({
                "decisionType": "architecture",
                "title": "Use event sourcing",
                "description": "Adopt an event-sourced write model",
                "rationale": "auditable history of state changes",
                "impactLevel": "high",
            }),
            "caller-1",
            None,
        )
        .await;
    let recorded = recorded.expect("decision_record should succeed");
    let recorded_json: serde_json::Value = serde_json::from_str(recorded.text_content().unwrap()).unwrap();
    let decision_id = recorded_json["id"].as_str().unwrap().to_string();

    let (_cid, updated) = exec
        .execute(
            "decision_update",
            json!({"decisionId": decision_id, "outcomeStatus": "successful"}),
            "caller-1",
            None,
        )
        .await;
    let updated = updated.expect("decision_update should succeed");
    let updated_json: serde_json::Value = serde_json::from_str(updated.text_content().unwrap()).unwrap();
    assert_eq!(updated_json["title"], "Use event sourcing");
    assert_eq!(updated_json["rationale"], "auditable history of state changes");
    assert_eq!(updated_json["outcomeStatus"], "successful");
}

#[tokio::test]
async fn context_search_is_scoped_to_the_resolved_project() {
    let exec = new_executor().await;
    let (_cid, proj_a) = exec.execute("project_create", json!({"name": "proj-a"}), "caller-1", None).await;
    let proj_a: serde_json::Value = serde_json::from_str(proj_a.unwrap().text_content().unwrap()).unwrap();
    let proj_a_id = proj_a["id"].as_str().unwrap().to_string();
    exec.execute(
        "context_store",
        json!({"type": "code", "content": "shared secret in project a", "projectId": proj_a_id}),
        "caller-1",
        None,
    )
    .await;

    let (_cid, proj_b) = exec.execute("project_create", json!({"name": "proj-b"}), "caller-1", None).await;
    let proj_b: serde_json::Value = serde_json::from_str(proj_b.unwrap().text_content().unwrap()).unwrap();
    let proj_b_id = proj_b["id"].as_str().unwrap().to_string();
    exec.execute(
        "context_store",
        json!({"type": "code", "content": "unrelated content in project b", "projectId": proj_b_id}),
        "caller-1",
        None,
    )
    .await;

    let (_cid, results) = exec
        .execute(
            "context_search",
            json!({"query": "shared secret", "projectId": proj_b_id}),
            "caller-1",
            None,
        )
        .await;
    let results = results.expect("context_search should succeed");
    let body: serde_json::Value = serde_json::from_str(results.text_content().unwrap()).unwrap();
    assert_eq!(body["count"], 0, "search scoped to project b must not see project a's context");
}

#[tokio::test]
async fn correlation_id_is_generated_when_absent_and_echoed_when_supplied() {
    let exec = new_executor().await;
    let (generated, _) = exec.execute("aidis_ping", json!({}), "caller-1", None).await;
    assert!(!generated.is_empty());

    let (echoed, _) = exec
        .execute("aidis_ping", json!({}), "caller-1", Some("fixed-id".to_string()))
        .await;
    assert_eq!(echoed, "fixed-id");
}
