use aidis_harness::error::AidisError;
use aidis_harness::mcp::{JsonRpcResponse, error_codes};
use aidis_harness::registry::ToolRegistry;
use aidis_harness::validator::validate;
use serde_json::json;

#[test]
fn unknown_tool_is_not_found() {
    let registry = ToolRegistry::new();
    assert!(registry.get("not_a_real_tool").is_none());
}

#[test]
fn full_validation_pipeline_for_a_known_tool() {
    let registry = ToolRegistry::new();
    let tool = registry.get("decision_record").unwrap();

    // transport quirk: affectedComponents arrives pre-serialized as a JSON string
    let raw = json!({
        "decisionType": "database",
        "title": "Choose Postgres",
        "description": "Use Postgres for the primary store",
        "rationale": "mature tooling and JSONB support",
        "impactLevel": "high",
        "affectedComponents": "[\"api\",\"storage\"]"
    });
    let coerced = validate(tool, raw).unwrap();
    assert_eq!(coerced["affectedComponents"], json!(["api", "storage"]));
}

#[test]
fn invalid_params_maps_to_jsonrpc_internal_error_with_kind_in_message() {
    let registry = ToolRegistry::new();
    let tool = registry.get("context_store").unwrap();
    let err = validate(tool, json!({"type": "code"})).unwrap_err();

    let resp = JsonRpcResponse::error(
        Some(json!(1)),
        err.jsonrpc_code(),
        format!("{}: {}", err.kind(), err),
    );
    assert_eq!(resp.error.as_ref().unwrap().code, error_codes::INTERNAL_ERROR);
    assert!(resp.error.unwrap().message.starts_with("InvalidParams"));
}

#[test]
fn project_switch_errors_carry_a_troubleshooting_hint() {
    let err = AidisError::NotFound("project 'ghost' does not exist".to_string());
    assert!(err.troubleshooting_hint().unwrap().contains("project_list"));
}

#[test]
fn every_catalog_tool_has_a_valid_schema() {
    let registry = ToolRegistry::new();
    for tool in registry.list() {
        let entry = registry.get(&tool.name).unwrap();
        // an empty-object call should either pass or fail with InvalidParams,
        // never panic or produce an Internal schema-compile error
        match validate(entry, json!({})) {
            Ok(_) => {}
            Err(e) => assert_eq!(e.kind(), "InvalidParams", "tool {}", tool.name),
        }
    }
}
