//! The two parallel front doors agents use to reach the daemon's Core
//! Executor: a line-delimited JSON-RPC 2.0 stdio transport, and an HTTP
//! transport serving health/readiness probes plus a `/mcp/tools/{name}`
//! adapter. Both share one `CoreExecutor` and one `AppState`.

pub mod api_error;
pub mod http_api;
pub mod stdio;

pub use http_api::{router, HttpState};
pub use stdio::StdioTransport;
