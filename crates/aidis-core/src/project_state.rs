//! Ambient "current project / current session" state, per caller.
//!
//! The source this is modeled on kept a single module-level holder for
//! "the current project". That makes concurrent callers interfere with each
//! other. Here the holder is a concurrent map keyed by caller identity, each
//! entry behind its own mutex, so unrelated callers never block on one
//! another and state is never implicitly shared.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::cache::StorageGateway;
use crate::types::{Project, ProjectStatus, Session};

#[derive(Debug, thiserror::Error)]
pub enum ProjectStateError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("pre-switch validation failed: {0}")]
    PreSwitchValidationFailed(String),
    #[error("atomic switch failed: {0}")]
    AtomicSwitchFailed(String),
    #[error("storage error: {0}")]
    Storage(#[from] crate::cache::StorageError),
}

type Result<T> = std::result::Result<T, ProjectStateError>;

#[derive(Debug, Clone, Default)]
struct CallerState {
    current_project_id: Option<Uuid>,
    current_session_id: Option<Uuid>,
}

/// Per-caller ambient state, backed by the Storage Gateway for durability
/// across process restarts (a fresh process re-derives in-memory state
/// lazily on first access rather than eagerly reloading every caller).
pub struct AmbientStateManager {
    callers: RwLock<HashMap<String, Arc<AsyncMutex<CallerState>>>>,
}

impl AmbientStateManager {
    pub fn new() -> Self {
        Self {
            callers: RwLock::new(HashMap::new()),
        }
    }

    fn caller_lock(&self, caller_id: &str) -> Arc<AsyncMutex<CallerState>> {
        if let Some(lock) = self.callers.read().expect("lock poisoned").get(caller_id) {
            return lock.clone();
        }
        let mut callers = self.callers.write().expect("lock poisoned");
        callers
            .entry(caller_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(CallerState::default())))
            .clone()
    }

    /// Ensures an active session exists for `caller_id`, auto-creating one
    /// (associated with the last-used project, or any active project if
    /// none is remembered) if there isn't already one. Returns the session.
    pub async fn ensure_session(
        &self,
        caller_id: &str,
        storage: &StorageGateway,
    ) -> Result<Session> {
        let lock = self.caller_lock(caller_id);
        let mut state = lock.lock().await;

        if state.current_project_id.is_none() && state.current_session_id.is_none() {
            if let Some((p, s)) = storage.get_ambient_state(caller_id).await? {
                state.current_project_id = p;
                state.current_session_id = s;
            }
        }

        if let Some(session_id) = state.current_session_id {
            if let Some(session) = storage.get_session(session_id).await? {
                if session.is_active() {
                    return Ok(session);
                }
            }
        }

        let project_id = match state.current_project_id {
            Some(id) => Some(id),
            None => storage.any_active_project().await?.map(|p| p.id),
        };

        let session = Session::new(project_id);
        storage.create_session(&session).await?;
        state.current_session_id = Some(session.id);
        state.current_project_id = project_id;
        storage
            .set_ambient_state(caller_id, project_id, Some(session.id))
            .await?;

        Ok(session)
    }

    /// Ends the caller's active session, if any. The next tool call will
    /// auto-create a new one via `ensure_session`.
    pub async fn end_session(&self, caller_id: &str, storage: &StorageGateway) -> Result<()> {
        let lock = self.caller_lock(caller_id);
        let mut state = lock.lock().await;
        if let Some(session_id) = state.current_session_id.take() {
            storage.end_session(session_id).await?;
            storage
                .set_ambient_state(caller_id, state.current_project_id, None)
                .await?;
        }
        Ok(())
    }

    /// Returns the current project, or — if unset — selects any active
    /// project, records the selection, and returns it.
    pub async fn current_project(
        &self,
        caller_id: &str,
        storage: &StorageGateway,
    ) -> Result<Option<Project>> {
        let lock = self.caller_lock(caller_id);
        let mut state = lock.lock().await;

        if state.current_project_id.is_none() {
            if let Some((p, _)) = storage.get_ambient_state(caller_id).await? {
                state.current_project_id = p;
            }
        }

        if let Some(id) = state.current_project_id {
            if let Some(project) = storage.get_project(id).await? {
                return Ok(Some(project));
            }
        }

        let Some(project) = storage.any_active_project().await? else {
            return Ok(None);
        };
        state.current_project_id = Some(project.id);
        storage
            .set_ambient_state(caller_id, Some(project.id), state.current_session_id)
            .await?;
        Ok(Some(project))
    }

    /// Three-phase validated project switch: pre-switch validation, atomic
    /// update, post-switch verification. On any failure the in-memory
    /// pointer is left untouched (it is only mutated after the storage
    /// write succeeds and is read back).
    pub async fn project_switch(
        &self,
        caller_id: &str,
        target: &str,
        storage: &StorageGateway,
    ) -> Result<Project> {
        let lock = self.caller_lock(caller_id);
        let mut state = lock.lock().await;

        // (a) pre-switch validation
        let target_project = storage
            .get_project_by_name(target)
            .await?
            .ok_or_else(|| ProjectStateError::NotFound(format!("project '{target}' not found")))?;

        if target_project.status != ProjectStatus::Active {
            return Err(ProjectStateError::PreSwitchValidationFailed(format!(
                "project '{target}' is archived"
            )));
        }

        // (b) atomic update
        storage
            .set_ambient_state(caller_id, Some(target_project.id), state.current_session_id)
            .await
            .map_err(|e| ProjectStateError::AtomicSwitchFailed(e.to_string()))?;

        // (c) post-switch verification
        let verified = storage.get_ambient_state(caller_id).await?;
        match verified {
            Some((Some(p), _)) if p == target_project.id => {
                state.current_project_id = Some(target_project.id);
                Ok(target_project)
            }
            _ => {
                // roll back to the pre-switch project
                let _ = storage
                    .set_ambient_state(caller_id, state.current_project_id, state.current_session_id)
                    .await;
                Err(ProjectStateError::AtomicSwitchFailed(
                    "post-switch verification did not observe the new pointer".into(),
                ))
            }
        }
    }
}

impl Default for AmbientStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_session_auto_creates_and_is_idempotent() {
        let storage = StorageGateway::new_in_memory().await.unwrap();
        let mgr = AmbientStateManager::new();

        let s1 = mgr.ensure_session("caller-a", &storage).await.unwrap();
        let s2 = mgr.ensure_session("caller-a", &storage).await.unwrap();
        assert_eq!(s1.id, s2.id);
    }

    #[tokio::test]
    async fn different_callers_have_independent_sessions() {
        let storage = StorageGateway::new_in_memory().await.unwrap();
        let mgr = AmbientStateManager::new();

        let s1 = mgr.ensure_session("caller-a", &storage).await.unwrap();
        let s2 = mgr.ensure_session("caller-b", &storage).await.unwrap();
        assert_ne!(s1.id, s2.id);
    }

    #[tokio::test]
    async fn switch_to_unknown_project_is_not_found_and_state_unchanged() {
        let storage = StorageGateway::new_in_memory().await.unwrap();
        let mgr = AmbientStateManager::new();

        let alpha = Project::new("alpha");
        storage.create_project(&alpha).await.unwrap();
        mgr.project_switch("caller-a", "alpha", &storage)
            .await
            .unwrap();

        let err = mgr
            .project_switch("caller-a", "does-not-exist", &storage)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectStateError::NotFound(_)));

        let current = mgr.current_project("caller-a", &storage).await.unwrap();
        assert_eq!(current.unwrap().id, alpha.id);
    }

    #[tokio::test]
    async fn switch_to_archived_project_fails_pre_switch_validation() {
        let storage = StorageGateway::new_in_memory().await.unwrap();
        let mgr = AmbientStateManager::new();

        let mut archived = Project::new("legacy");
        archived.status = ProjectStatus::Archived;
        storage.create_project(&archived).await.unwrap();

        let err = mgr
            .project_switch("caller-a", "legacy", &storage)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectStateError::PreSwitchValidationFailed(_)));
    }

    #[tokio::test]
    async fn current_project_selects_any_active_when_unset() {
        let storage = StorageGateway::new_in_memory().await.unwrap();
        let mgr = AmbientStateManager::new();

        let alpha = Project::new("alpha");
        storage.create_project(&alpha).await.unwrap();

        let current = mgr.current_project("caller-a", &storage).await.unwrap();
        assert_eq!(current.unwrap().id, alpha.id);
    }

    #[tokio::test]
    async fn ending_session_allows_a_new_one_to_be_created() {
        let storage = StorageGateway::new_in_memory().await.unwrap();
        let mgr = AmbientStateManager::new();

        let s1 = mgr.ensure_session("caller-a", &storage).await.unwrap();
        mgr.end_session("caller-a", &storage).await.unwrap();
        let s2 = mgr.ensure_session("caller-a", &storage).await.unwrap();
        assert_ne!(s1.id, s2.id);
    }
}
