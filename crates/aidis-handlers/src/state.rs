//! Shared daemon state threaded through every handler call.

use chrono::{DateTime, Utc};

use aidis_core::cache::StorageGateway;
use aidis_core::embedder::{CachedEmbedder, FallbackEmbedder};
use aidis_core::project_state::AmbientStateManager;
use aidis_harness::registry::ToolRegistry;

/// Embedding cache size: keeps repeated calls for the same text (e.g. a
/// re-run search query) from recomputing the fallback embedding.
const EMBEDDER_CACHE_SIZE: usize = 1024;

pub struct AppState {
    pub storage: StorageGateway,
    pub ambient: AmbientStateManager,
    pub embedder: CachedEmbedder<FallbackEmbedder>,
    pub registry: ToolRegistry,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(storage: StorageGateway) -> Self {
        Self {
            storage,
            ambient: AmbientStateManager::new(),
            embedder: CachedEmbedder::new(FallbackEmbedder, EMBEDDER_CACHE_SIZE),
            registry: ToolRegistry::new(),
            started_at: Utc::now(),
        }
    }
}
