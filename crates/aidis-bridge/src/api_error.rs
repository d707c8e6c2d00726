//! HTTP error envelope.
//!
//! Wraps a typed [`AidisError`] with the correlation id generated for the
//! request and renders it as the `{success:false, error, type, correlationId}`
//! body every failing HTTP response uses. Status codes follow the typed
//! error kind, not a single fixed code, per the propagation policy: 4xx for
//! caller mistakes (`InvalidParams`, `NotFound`, `Conflict`), 5xx for
//! everything the caller could not have prevented.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use aidis_harness::error::AidisError;

#[derive(Debug)]
pub struct ApiError {
    pub correlation_id: String,
    pub source: AidisError,
}

impl ApiError {
    pub fn new(correlation_id: String, source: AidisError) -> Self {
        Self { correlation_id, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.source.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "success": false,
            "error": self.source.to_string(),
            "type": self.source.kind(),
            "correlationId": self.correlation_id,
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_found_maps_to_404_with_envelope() {
        let err = ApiError::new("cid-1".into(), AidisError::NotFound("project missing".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["type"], "NotFound");
        assert_eq!(parsed["correlationId"], "cid-1");
    }

    #[tokio::test]
    async fn internal_maps_to_500() {
        let err = ApiError::new("cid-2".into(), AidisError::Internal("boom".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn resource_exhausted_maps_to_503() {
        let err = ApiError::new("cid-3".into(), AidisError::ResourceExhausted("pool saturated".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
