//! Stdio Transport: line-delimited JSON-RPC 2.0 on stdin/stdout.
//!
//! Shares the Core Executor with the HTTP transport. Never writes anything
//! to stdout except a single framed JSON-RPC response line per request; all
//! diagnostics go to stderr via `tracing`.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use aidis_harness::mcp::{
    error_codes, InitializeResult, JsonRpcRequest, JsonRpcResponse, McpResource, ResourceContent,
    ServerCapabilities, ServerInfo, ToolsCapability, MCP_PROTOCOL_VERSION,
};
use aidis_handlers::{AppState, CoreExecutor};

const STATUS_RESOURCE_URI: &str = "aidis://status";

pub struct StdioTransport {
    executor: CoreExecutor,
    app: Arc<AppState>,
}

impl StdioTransport {
    pub fn new(app: Arc<AppState>) -> Self {
        let executor = CoreExecutor::new(Arc::clone(&app));
        Self { executor, app }
    }

    /// Runs until stdin closes (EOF), reading one JSON-RPC request per line
    /// and writing one JSON-RPC response per line.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line).await;
            let mut text = serde_json::to_string(&response).unwrap_or_else(|e| {
                warn!(error = %e, "failed to serialize JSON-RPC response");
                json!({"jsonrpc": "2.0", "id": null, "error": {"code": error_codes::INTERNAL_ERROR, "message": "serialization failure"}})
                    .to_string()
            });
            text.push('\n');
            stdout.write_all(text.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                return JsonRpcResponse::error(None, error_codes::PARSE_ERROR, format!("parse error: {e}"));
            }
        };
        debug!(method = %request.method, "stdio request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            "resources/list" => self.handle_resources_list(request.id),
            "resources/read" => self.handle_resources_read(request.id, request.params).await,
            other => JsonRpcResponse::error(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("method '{other}' not found"),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
                resources: Some(Default::default()),
            },
            server_info: ServerInfo {
                name: "aidis".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = self.app.registry.list();
        JsonRpcResponse::success(id, json!({"tools": tools}))
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let name = match params.get("name").and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "missing 'name'");
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let (_correlation_id, result) = self.executor.execute(&name, arguments, "stdio-caller", None).await;
        match result {
            Ok(tool_result) => JsonRpcResponse::success(id, serde_json::to_value(tool_result).unwrap_or(Value::Null)),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, format!("{}: {}", e.kind(), e)),
        }
    }

    fn handle_resources_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let resource = McpResource {
            uri: STATUS_RESOURCE_URI.to_string(),
            name: "Daemon status".to_string(),
            description: Some("Current health and uptime snapshot".to_string()),
            mime_type: Some("application/json".to_string()),
        };
        JsonRpcResponse::success(id, json!({"resources": [resource]}))
    }

    async fn handle_resources_read(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let uri = params.as_ref().and_then(|p| p.get("uri")).and_then(Value::as_str).unwrap_or("");
        if uri != STATUS_RESOURCE_URI {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, format!("unknown resource '{uri}'"));
        }
        let health = self.app.storage.healthz().await;
        let uptime_secs = (chrono::Utc::now() - self.app.started_at).num_seconds().max(0);
        let text = json!({
            "healthy": health.healthy,
            "uptimeSecs": uptime_secs,
            "toolCount": self.app.registry.len(),
        })
        .to_string();
        let content = ResourceContent {
            uri: STATUS_RESOURCE_URI.to_string(),
            mime_type: Some("application/json".to_string()),
            text: Some(text),
            blob: None,
        };
        JsonRpcResponse::success(id, json!({"contents": [content]}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidis_core::cache::StorageGateway;

    async fn new_transport() -> StdioTransport {
        let storage = StorageGateway::new_in_memory().await.expect("in-memory db");
        StdioTransport::new(Arc::new(AppState::new(storage)))
    }

    #[tokio::test]
    async fn tools_list_enumerates_the_catalog() {
        let t = new_transport().await;
        let resp = t.handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        assert!(!resp.is_error());
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 31);
    }

    #[tokio::test]
    async fn tools_call_round_trips_ping() {
        let t = new_transport().await;
        let line = r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"aidis_ping","arguments":{}}}"#;
        let resp = t.handle_line(line).await;
        assert!(!resp.is_error());
    }

    #[tokio::test]
    async fn unknown_tool_maps_to_internal_error_code() {
        let t = new_transport().await;
        let line = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"does_not_exist","arguments":{}}}"#;
        let resp = t.handle_line(line).await;
        assert!(resp.is_error());
        assert_eq!(resp.error.unwrap().code, error_codes::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let t = new_transport().await;
        let resp = t.handle_line(r#"{"jsonrpc":"2.0","id":4,"method":"bogus"}"#).await;
        assert!(resp.is_error());
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error() {
        let t = new_transport().await;
        let resp = t.handle_line("not json").await;
        assert!(resp.is_error());
        assert_eq!(resp.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn resources_read_returns_status_snapshot() {
        let t = new_transport().await;
        let line = r#"{"jsonrpc":"2.0","id":5,"method":"resources/read","params":{"uri":"aidis://status"}}"#;
        let resp = t.handle_line(line).await;
        assert!(!resp.is_error());
        let contents = resp.result.unwrap()["contents"].as_array().unwrap().clone();
        assert_eq!(contents.len(), 1);
    }
}
