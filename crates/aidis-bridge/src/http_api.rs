//! HTTP Transport: health/readiness probes plus the `/mcp/tools/{name}`
//! adapter, all sharing one [`CoreExecutor`] with the stdio transport.

use std::sync::Arc;

use axum::extract::{HeaderMap, Path, State};
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use aidis_harness::circuit_breaker::{CircuitBreaker, CircuitState};
use aidis_harness::error::new_correlation_id;
use aidis_handlers::{AppState, CoreExecutor};
use aidis_telemetry::tracing_setup::request_id_middleware;

use crate::api_error::ApiError;

/// State shared by every HTTP handler. Holds its own `Arc<AppState>` clone
/// alongside the executor so health probes can read storage/embedder status
/// without routing through a tool call.
#[derive(Clone)]
pub struct HttpState {
    pub app: Arc<AppState>,
    pub executor: Arc<CoreExecutor>,
    /// Tracks the database-init circuit breaker so `/readyz` can fold its
    /// state into the readiness decision; set by the Lifecycle Manager.
    pub db_circuit: CircuitBreaker,
}

impl HttpState {
    pub fn new(app: Arc<AppState>, db_circuit: CircuitBreaker) -> Self {
        let executor = Arc::new(CoreExecutor::new(Arc::clone(&app)));
        Self { app, executor, db_circuit }
    }
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(healthz))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/health/mcp", get(health_mcp))
        .route("/health/database", get(health_database))
        .route("/health/embeddings", get(health_embeddings))
        .route("/mcp/tools/{name}", post(call_tool))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health / readiness
// ---------------------------------------------------------------------------

/// Always 200 while the process is able to answer at all.
async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

async fn livez(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime_secs = (chrono::Utc::now() - state.app.started_at).num_seconds().max(0);
    Json(json!({"status": "alive", "uptimeSecs": uptime_secs}))
}

/// 200 iff the pool is healthy and the database circuit breaker is not open;
/// 503 otherwise. Health endpoints never block on the pool beyond its own
/// bounded probe.
async fn readyz(State(state): State<HttpState>) -> impl IntoResponse {
    let pool = state.app.storage.healthz().await;
    let circuit_open = state.db_circuit.state().await == CircuitState::Open;
    let ready = pool.healthy && !circuit_open;

    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "database": if ready { "connected" } else { "unavailable" },
    });
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body))
}

async fn health_mcp(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "toolCount": state.app.registry.len(),
    }))
}

async fn health_database(State(state): State<HttpState>) -> impl IntoResponse {
    let pool = state.app.storage.healthz().await;
    Json(json!({
        "healthy": pool.healthy,
        "utilization": pool.utilization,
        "activeConnections": pool.active,
        "idleConnections": pool.idle,
        "circuitState": format!("{:?}", state.db_circuit.state().await),
    }))
}

async fn health_embeddings(_state: State<HttpState>) -> impl IntoResponse {
    Json(json!({"status": "ok", "mode": "fallback"}))
}

// ---------------------------------------------------------------------------
// Tool call
// ---------------------------------------------------------------------------

async fn call_tool(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(new_correlation_id);

    let args = body
        .get("arguments")
        .or_else(|| body.get("args"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let (correlation_id, result) = state
        .executor
        .execute(&name, args, "http-caller", Some(correlation_id))
        .await;

    match result {
        Ok(tool_result) => {
            let result_value: Value = tool_result
                .text_content()
                .and_then(|t| serde_json::from_str(t).ok())
                .unwrap_or(Value::Null);
            Ok(Json(json!({"success": true, "result": result_value})))
        }
        Err(e) => Err(ApiError::new(correlation_id, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidis_core::cache::StorageGateway;
    use aidis_harness::circuit_breaker::CircuitBreakerConfig;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let storage = StorageGateway::new_in_memory().await.expect("in-memory db");
        let app = Arc::new(AppState::new(storage));
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        router(HttpState::new(app, breaker))
    }

    #[tokio::test]
    async fn healthz_is_always_200() {
        let app = test_router().await;
        let response = app
            .oneshot(axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readyz_is_200_when_pool_healthy_and_circuit_closed() {
        let app = test_router().await;
        let response = app
            .oneshot(axum::http::Request::builder().uri("/readyz").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tool_call_round_trips_aidis_ping() {
        let app = test_router().await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/mcp/tools/aidis_ping")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["result"]["pong"], true);
    }

    #[tokio::test]
    async fn unknown_tool_maps_to_404_with_envelope() {
        let app = test_router().await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/mcp/tools/does_not_exist")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["type"], "NotFound");
    }
}
