//! Telemetry and observability infrastructure for AIDIS services.
//!
//! This crate provides a unified observability layer combining logging and
//! distributed tracing. It integrates with the `tracing` ecosystem for
//! structured logging and spans, and provides correlation-id generation and
//! HTTP request-id propagation.
//!
//! Key components:
//! - **Logging**: Human-readable and JSON-formatted output via `tracing-subscriber`
//! - **Tracing**: Correlation-id generation and Axum request-id middleware

pub mod logging;
pub mod tracing_setup;
