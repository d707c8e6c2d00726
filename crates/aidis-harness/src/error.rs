//! The typed error kinds every handler and transport speaks.
//!
//! A handler never panics its way out of a tool call: it returns one of
//! these variants, the Core Executor logs it with the request's
//! correlation id, and each transport maps it to its own wire form
//! (JSON-RPC error code on stdio, HTTP status + envelope on the bridge).

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AidisError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("pre-switch validation failed: {0}")]
    PreSwitchValidationFailed(String),

    #[error("atomic switch failed: {0}")]
    AtomicSwitchFailed(String),
}

impl AidisError {
    /// Stable machine-readable tag used in log lines and error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            AidisError::InvalidParams(_) => "InvalidParams",
            AidisError::NotFound(_) => "NotFound",
            AidisError::Conflict(_) => "Conflict",
            AidisError::ResourceExhausted(_) => "ResourceExhausted",
            AidisError::Transient(_) => "Transient",
            AidisError::Internal(_) => "Internal",
            AidisError::PreSwitchValidationFailed(_) => "PreSwitchValidationFailed",
            AidisError::AtomicSwitchFailed(_) => "AtomicSwitchFailed",
        }
    }

    /// JSON-RPC error code for the stdio transport. Every tool-execution
    /// failure maps to Internal Error per the protocol; the typed kind is
    /// carried in the message text instead of a dedicated code.
    pub fn jsonrpc_code(&self) -> i32 {
        crate::mcp::error_codes::INTERNAL_ERROR
    }

    /// HTTP status for the bridge transport.
    pub fn http_status(&self) -> u16 {
        match self {
            AidisError::InvalidParams(_) => 400,
            AidisError::NotFound(_) => 404,
            AidisError::Conflict(_) => 409,
            AidisError::ResourceExhausted(_) => 503,
            AidisError::Transient(_) => 503,
            AidisError::Internal(_) => 500,
            AidisError::PreSwitchValidationFailed(_) => 409,
            AidisError::AtomicSwitchFailed(_) => 500,
        }
    }

    /// A short hint steering the caller toward recovery, chosen by kind.
    /// Surfaced alongside the message in error envelopes.
    pub fn troubleshooting_hint(&self) -> Option<&'static str> {
        match self {
            AidisError::NotFound(_) => Some("run project_list to see available projects"),
            AidisError::Conflict(_) => Some("pick a different name or delete the existing one"),
            AidisError::PreSwitchValidationFailed(_) => {
                Some("the target project may be archived or missing; check project_list")
            }
            AidisError::ResourceExhausted(_) => Some("retry shortly; the connection pool is saturated"),
            _ => None,
        }
    }
}

impl From<aidis_core::cache::StorageError> for AidisError {
    fn from(e: aidis_core::cache::StorageError) -> Self {
        match e {
            aidis_core::cache::StorageError::NotFound => AidisError::NotFound("not found".into()),
            aidis_core::cache::StorageError::Conflict(msg) => AidisError::Conflict(msg),
            aidis_core::cache::StorageError::Sqlite(e) => AidisError::Transient(e.to_string()),
        }
    }
}

impl From<aidis_core::project_state::ProjectStateError> for AidisError {
    fn from(e: aidis_core::project_state::ProjectStateError) -> Self {
        use aidis_core::project_state::ProjectStateError as P;
        match e {
            P::NotFound(msg) => AidisError::NotFound(msg),
            P::PreSwitchValidationFailed(msg) => AidisError::PreSwitchValidationFailed(msg),
            P::AtomicSwitchFailed(msg) => AidisError::AtomicSwitchFailed(msg),
            P::Storage(e) => e.into(),
        }
    }
}

/// Generate a correlation id for a call that did not supply one.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_string() {
        assert_eq!(AidisError::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(AidisError::Conflict("x".into()).kind(), "Conflict");
    }

    #[test]
    fn http_status_maps_client_vs_server_errors() {
        assert_eq!(AidisError::InvalidParams("x".into()).http_status(), 400);
        assert_eq!(AidisError::NotFound("x".into()).http_status(), 404);
        assert_eq!(AidisError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn not_found_has_a_hint() {
        assert!(AidisError::NotFound("x".into()).troubleshooting_hint().is_some());
    }

    #[test]
    fn invalid_params_has_no_hint() {
        assert!(AidisError::InvalidParams("x".into())
            .troubleshooting_hint()
            .is_none());
    }

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err: AidisError = aidis_core::cache::StorageError::NotFound.into();
        assert_eq!(err.kind(), "NotFound");
    }
}
