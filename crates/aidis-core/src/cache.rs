//! Storage Gateway: pooled transactional access to the relational+vector
//! store backing projects, sessions, contexts, decisions, and tasks.
//!
//! SQLite has no native vector column, so the context embedding is stored as
//! a serialized `f32` blob and similarity is computed in Rust at query time
//! (`cosine_similarity`) — acceptable at the scale a single daemon instance
//! serves, and it keeps the gateway free of an external vector-index
//! dependency.

use std::path::Path;

use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::types::{
    Alternative, Context, ContextType, Decision, DecisionType, ImpactLevel, OutcomeStatus,
    Project, ProjectStatus, ScoredContext, Session, SessionMetrics, Task, TaskPriority, TaskStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
}

type Result<T> = std::result::Result<T, StorageError>;

fn enum_to_sql<T: serde::Serialize>(val: &T) -> String {
    let s = serde_json::to_string(val).expect("serialize enum");
    s.trim_matches('"').to_string()
}

fn enum_from_sql<T: serde::de::DeserializeOwned>(raw: &str) -> T {
    let quoted = format!("\"{}\"", raw);
    serde_json::from_str(&quoted).expect("deserialize enum")
}

fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid date")
        .with_timezone(&Utc)
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn embedding_from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[0, 1]` for two equal-length, non-zero vectors.
/// Returns `0.0` for degenerate input (caller treats it as "no match"
/// rather than raising, since a stored row with a malformed embedding
/// should not fail an entire search).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Snapshot returned by `healthz()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolHealth {
    pub healthy: bool,
    pub utilization: f32,
    pub active: u32,
    pub idle: u32,
}

#[derive(Debug, Default, Clone)]
pub struct ContextSearchFilter {
    pub context_type: Option<ContextType>,
    pub tags: Vec<String>,
}

/// Storage Gateway. `tokio_rusqlite::Connection` already serializes access
/// onto a single worker thread, which gives us the "one writer transaction
/// at a time" behavior the contract requires without an explicit pool.
pub struct StorageGateway {
    conn: Connection,
}

impl StorageGateway {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        let db = Self { conn };
        db.init_schema().await?;
        Ok(db)
    }

    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        let db = Self { conn };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA cache_size=-64000;
                    PRAGMA foreign_keys=ON;
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS projects (
                        id              TEXT PRIMARY KEY,
                        name            TEXT NOT NULL UNIQUE,
                        description     TEXT,
                        status          TEXT NOT NULL,
                        git_repo_url    TEXT,
                        root_directory  TEXT,
                        metadata        TEXT,
                        created_at      TEXT NOT NULL,
                        updated_at      TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS sessions (
                        id            TEXT PRIMARY KEY,
                        project_id    TEXT,
                        started_at    TEXT NOT NULL,
                        ended_at      TEXT,
                        title         TEXT,
                        description   TEXT,
                        goal          TEXT,
                        tags          TEXT NOT NULL,
                        ai_model      TEXT,
                        context_count INTEGER NOT NULL DEFAULT 0,
                        decision_count INTEGER NOT NULL DEFAULT 0
                    );

                    CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);

                    CREATE TABLE IF NOT EXISTS contexts (
                        id              TEXT PRIMARY KEY,
                        project_id      TEXT NOT NULL REFERENCES projects(id),
                        session_id      TEXT,
                        context_type    TEXT NOT NULL,
                        content         TEXT NOT NULL,
                        tags            TEXT NOT NULL,
                        relevance_score INTEGER NOT NULL DEFAULT 5,
                        metadata        TEXT,
                        created_at      TEXT NOT NULL,
                        embedding       BLOB
                    );

                    CREATE INDEX IF NOT EXISTS idx_contexts_project ON contexts(project_id);
                    CREATE INDEX IF NOT EXISTS idx_contexts_type ON contexts(context_type);
                    CREATE INDEX IF NOT EXISTS idx_contexts_created ON contexts(created_at);

                    CREATE TABLE IF NOT EXISTS decisions (
                        id                      TEXT PRIMARY KEY,
                        project_id              TEXT NOT NULL REFERENCES projects(id),
                        decision_type           TEXT NOT NULL,
                        title                   TEXT NOT NULL,
                        description             TEXT NOT NULL,
                        rationale               TEXT NOT NULL,
                        impact_level            TEXT NOT NULL,
                        alternatives_considered TEXT NOT NULL,
                        problem_statement       TEXT,
                        affected_components     TEXT NOT NULL,
                        tags                    TEXT NOT NULL,
                        outcome_status          TEXT NOT NULL,
                        outcome_notes           TEXT,
                        lessons_learned         TEXT,
                        decision_date           TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_decisions_project ON decisions(project_id);
                    CREATE INDEX IF NOT EXISTS idx_decisions_type ON decisions(decision_type);

                    CREATE TABLE IF NOT EXISTS tasks (
                        id            TEXT PRIMARY KEY,
                        project_id    TEXT NOT NULL REFERENCES projects(id),
                        title         TEXT NOT NULL,
                        description   TEXT,
                        task_type     TEXT NOT NULL,
                        priority      TEXT NOT NULL,
                        status        TEXT NOT NULL,
                        assignee      TEXT,
                        creator       TEXT,
                        tags          TEXT NOT NULL,
                        dependencies  TEXT NOT NULL,
                        metadata      TEXT,
                        created_at    TEXT NOT NULL,
                        started_at    TEXT,
                        completed_at  TEXT
                    );

                    CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
                    CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

                    CREATE TABLE IF NOT EXISTS ambient_state (
                        caller_id          TEXT PRIMARY KEY,
                        current_project_id TEXT,
                        current_session_id TEXT
                    );
                    ",
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Readiness probe: a trivial round-trip query against the pool.
    pub async fn healthz(&self) -> PoolHealth {
        let ok = self
            .conn
            .call(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?))
            .await
            .is_ok();
        PoolHealth {
            healthy: ok,
            utilization: if ok { 0.0 } else { 1.0 },
            active: if ok { 1 } else { 0 },
            idle: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub async fn create_project(&self, project: &Project) -> Result<()> {
        let id = project.id.to_string();
        let name = project.name.clone();
        let description = project.description.clone();
        let status = enum_to_sql(&project.status);
        let git_repo_url = project.git_repo_url.clone();
        let root_directory = project.root_directory.clone();
        let metadata = project.metadata.as_ref().map(|v| v.to_string());
        let created_at = project.created_at.to_rfc3339();
        let updated_at = project.updated_at.to_rfc3339();

        let inserted = self
            .conn
            .call(move |conn| {
                let existing: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM projects WHERE name = ?1",
                    rusqlite::params![name],
                    |r| r.get(0),
                )?;
                if existing > 0 {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO projects (id, name, description, status, git_repo_url,
                        root_directory, metadata, created_at, updated_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                    rusqlite::params![
                        id, name, description, status, git_repo_url, root_directory, metadata,
                        created_at, updated_at
                    ],
                )?;
                Ok(true)
            })
            .await
            .map_err(StorageError::from)?;

        if inserted {
            Ok(())
        } else {
            Err(StorageError::Conflict("project name already exists".to_string()))
        }
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, status, git_repo_url, root_directory,
                            metadata, created_at, updated_at FROM projects WHERE id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![id])?;
                Ok(match rows.next()? {
                    Some(row) => Some(row_to_project(row)?),
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, status, git_repo_url, root_directory,
                            metadata, created_at, updated_at FROM projects WHERE name = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![name])?;
                Ok(match rows.next()? {
                    Some(row) => Some(row_to_project(row)?),
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, status, git_repo_url, root_directory,
                            metadata, created_at, updated_at FROM projects ORDER BY created_at",
                )?;
                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_project(row)?);
                }
                Ok(out)
            })
            .await
            .map_err(StorageError::from)
    }

    /// Any project with `status = active`, ordered by creation time.
    pub async fn any_active_project(&self) -> Result<Option<Project>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, status, git_repo_url, root_directory,
                            metadata, created_at, updated_at FROM projects
                     WHERE status = 'active' ORDER BY created_at LIMIT 1",
                )?;
                let mut rows = stmt.query([])?;
                Ok(match rows.next()? {
                    Some(row) => Some(row_to_project(row)?),
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        let id_str = id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM contexts WHERE project_id = ?1",
                    rusqlite::params![id_str],
                )?;
                tx.execute(
                    "DELETE FROM decisions WHERE project_id = ?1",
                    rusqlite::params![id_str],
                )?;
                tx.execute(
                    "DELETE FROM tasks WHERE project_id = ?1",
                    rusqlite::params![id_str],
                )?;
                tx.execute(
                    "UPDATE sessions SET project_id = NULL WHERE project_id = ?1",
                    rusqlite::params![id_str],
                )?;
                let changed = tx.execute(
                    "DELETE FROM projects WHERE id = ?1",
                    rusqlite::params![id_str],
                )?;
                tx.commit()?;
                Ok(changed)
            })
            .await
            .map_err(StorageError::from)?;

        if changed == 0 {
            Err(StorageError::NotFound)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        let id = session.id.to_string();
        let project_id = session.project_id.map(|p| p.to_string());
        let started_at = session.started_at.to_rfc3339();
        let title = session.title.clone();
        let description = session.description.clone();
        let goal = session.goal.clone();
        let tags = serde_json::to_string(&session.tags).expect("serialize tags");
        let ai_model = session.ai_model.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, project_id, started_at, ended_at, title,
                        description, goal, tags, ai_model, context_count, decision_count)
                     VALUES (?1,?2,?3,NULL,?4,?5,?6,?7,?8,0,0)",
                    rusqlite::params![
                        id, project_id, started_at, title, description, goal, tags, ai_model
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, started_at, ended_at, title, description, goal,
                            tags, ai_model, context_count, decision_count
                     FROM sessions WHERE id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![id])?;
                Ok(match rows.next()? {
                    Some(row) => Some(row_to_session(row)?),
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn end_session(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        let ended_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
                    rusqlite::params![ended_at, id],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn set_session_project(&self, session_id: Uuid, project_id: Uuid) -> Result<()> {
        let session_id = session_id.to_string();
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET project_id = ?1 WHERE id = ?2",
                    rusqlite::params![project_id, session_id],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn increment_session_context_count(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET context_count = context_count + 1 WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    /// Purges ended sessions older than `older_than`. Not invoked by the
    /// main loop — an explicit operator action (see design notes on
    /// retention).
    pub async fn cleanup_sessions_older_than(
        &self,
        older_than: chrono::Duration,
    ) -> Result<u64> {
        let cutoff = (Utc::now() - older_than).to_rfc3339();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM sessions WHERE ended_at IS NOT NULL AND ended_at < ?1",
                    rusqlite::params![cutoff],
                )?;
                Ok(n as u64)
            })
            .await
            .map_err(StorageError::from)
    }

    // -----------------------------------------------------------------------
    // Ambient per-caller state (current project / current session pointers)
    // -----------------------------------------------------------------------

    pub async fn get_ambient_state(
        &self,
        caller_id: &str,
    ) -> Result<Option<(Option<Uuid>, Option<Uuid>)>> {
        let caller_id = caller_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT current_project_id, current_session_id FROM ambient_state
                     WHERE caller_id = ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![caller_id])?;
                Ok(match rows.next()? {
                    Some(row) => {
                        let p: Option<String> = row.get(0)?;
                        let s: Option<String> = row.get(1)?;
                        Some((
                            p.map(|s| Uuid::parse_str(&s).expect("valid uuid")),
                            s.map(|s| Uuid::parse_str(&s).expect("valid uuid")),
                        ))
                    }
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn set_ambient_state(
        &self,
        caller_id: &str,
        project_id: Option<Uuid>,
        session_id: Option<Uuid>,
    ) -> Result<()> {
        let caller_id = caller_id.to_string();
        let project_id = project_id.map(|p| p.to_string());
        let session_id = session_id.map(|s| s.to_string());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO ambient_state (caller_id, current_project_id, current_session_id)
                     VALUES (?1,?2,?3)
                     ON CONFLICT(caller_id) DO UPDATE SET
                        current_project_id=excluded.current_project_id,
                        current_session_id=excluded.current_session_id",
                    rusqlite::params![caller_id, project_id, session_id],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    pub async fn insert_context(&self, ctx: &Context) -> Result<()> {
        let id = ctx.id.to_string();
        let project_id = ctx.project_id.to_string();
        let session_id = ctx.session_id.map(|s| s.to_string());
        let context_type = enum_to_sql(&ctx.context_type);
        let content = ctx.content.clone();
        let tags = serde_json::to_string(&ctx.tags).expect("serialize tags");
        let relevance_score = ctx.relevance_score;
        let metadata = ctx.metadata.as_ref().map(|v| v.to_string());
        let created_at = ctx.created_at.to_rfc3339();
        let embedding = ctx.embedding.as_deref().map(embedding_to_blob);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO contexts (id, project_id, session_id, context_type, content,
                        tags, relevance_score, metadata, created_at, embedding)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                    rusqlite::params![
                        id, project_id, session_id, context_type, content, tags, relevance_score,
                        metadata, created_at, embedding
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn get_recent_contexts(
        &self,
        project_id: Uuid,
        limit: u32,
    ) -> Result<Vec<Context>> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE project_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                    CONTEXT_SELECT
                ))?;
                let mut rows = stmt.query(rusqlite::params![project_id, limit])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_context(row)?);
                }
                Ok(out)
            })
            .await
            .map_err(StorageError::from)
    }

    /// Vector-similarity top-k search, restricted to one project and the
    /// optional type/tag filters. Cosine similarity is computed in Rust
    /// since SQLite carries the embedding as an opaque blob.
    pub async fn search_contexts(
        &self,
        project_id: Uuid,
        query_embedding: Vec<f32>,
        filter: ContextSearchFilter,
        limit: u32,
        min_similarity: f32,
    ) -> Result<Vec<ScoredContext>> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE project_id = ?1 AND embedding IS NOT NULL",
                    CONTEXT_SELECT
                ))?;
                let mut rows = stmt.query(rusqlite::params![project_id])?;
                let mut scored = Vec::new();
                while let Some(row) = rows.next()? {
                    let ctx = row_to_context(row)?;
                    if let Some(t) = filter.context_type {
                        if ctx.context_type != t {
                            continue;
                        }
                    }
                    if !filter.tags.is_empty() && !filter.tags.iter().any(|t| ctx.tags.contains(t)) {
                        continue;
                    }
                    let Some(embedding) = ctx.embedding.as_deref() else {
                        continue;
                    };
                    let similarity = cosine_similarity(&query_embedding, embedding);
                    if similarity < min_similarity {
                        continue;
                    }
                    scored.push(ScoredContext { context: ctx, similarity });
                }
                scored.sort_by(|a, b| {
                    b.similarity
                        .partial_cmp(&a.similarity)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                scored.truncate(limit as usize);
                Ok(scored)
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn delete_context(&self, context_id: Uuid, project_id: Uuid) -> Result<bool> {
        let context_id = context_id.to_string();
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM contexts WHERE id = ?1 AND project_id = ?2",
                    rusqlite::params![context_id, project_id],
                )?;
                Ok(n > 0)
            })
            .await
            .map_err(StorageError::from)
    }

    /// `(total, with_embedding, recent_24h, per_type)`.
    pub async fn context_stats(
        &self,
        project_id: Uuid,
    ) -> Result<(u64, u64, u64, Vec<(String, u64)>)> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let total: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM contexts WHERE project_id = ?1",
                    rusqlite::params![project_id],
                    |r| r.get(0),
                )?;
                let with_embedding: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM contexts WHERE project_id = ?1 AND embedding IS NOT NULL",
                    rusqlite::params![project_id],
                    |r| r.get(0),
                )?;
                let cutoff = (Utc::now() - chrono::Duration::hours(24)).to_rfc3339();
                let recent: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM contexts WHERE project_id = ?1 AND created_at >= ?2",
                    rusqlite::params![project_id, cutoff],
                    |r| r.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT context_type, COUNT(*) FROM contexts WHERE project_id = ?1
                     GROUP BY context_type",
                )?;
                let mut rows = stmt.query(rusqlite::params![project_id])?;
                let mut per_type = Vec::new();
                while let Some(row) = rows.next()? {
                    per_type.push((row.get::<_, String>(0)?, row.get::<_, u64>(1)?));
                }
                Ok((total, with_embedding, recent, per_type))
            })
            .await
            .map_err(StorageError::from)
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    pub async fn insert_decision(&self, d: &Decision) -> Result<()> {
        let id = d.id.to_string();
        let project_id = d.project_id.to_string();
        let decision_type = enum_to_sql(&d.decision_type);
        let title = d.title.clone();
        let description = d.description.clone();
        let rationale = d.rationale.clone();
        let impact_level = enum_to_sql(&d.impact_level);
        let alternatives =
            serde_json::to_string(&d.alternatives_considered).expect("serialize alternatives");
        let problem_statement = d.problem_statement.clone();
        let affected_components =
            serde_json::to_string(&d.affected_components).expect("serialize components");
        let tags = serde_json::to_string(&d.tags).expect("serialize tags");
        let outcome_status = d.outcome_status.as_str().to_string();
        let outcome_notes = d.outcome_notes.clone();
        let lessons_learned = d.lessons_learned.clone();
        let decision_date = d.decision_date.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO decisions (id, project_id, decision_type, title, description,
                        rationale, impact_level, alternatives_considered, problem_statement,
                        affected_components, tags, outcome_status, outcome_notes,
                        lessons_learned, decision_date)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                    rusqlite::params![
                        id, project_id, decision_type, title, description, rationale,
                        impact_level, alternatives, problem_statement, affected_components, tags,
                        outcome_status, outcome_notes, lessons_learned, decision_date
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn get_decision(&self, id: Uuid) -> Result<Option<Decision>> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", DECISION_SELECT))?;
                let mut rows = stmt.query(rusqlite::params![id])?;
                Ok(match rows.next()? {
                    Some(row) => Some(row_to_decision(row)?),
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn search_decisions(
        &self,
        project_id: Uuid,
        query: Option<String>,
        limit: u32,
    ) -> Result<Vec<Decision>> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE project_id = ?1 ORDER BY decision_date DESC",
                    DECISION_SELECT
                ))?;
                let mut rows = stmt.query(rusqlite::params![project_id])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let d = row_to_decision(row)?;
                    if let Some(q) = &query {
                        let q = q.to_lowercase();
                        if !d.title.to_lowercase().contains(&q)
                            && !d.description.to_lowercase().contains(&q)
                        {
                            continue;
                        }
                    }
                    out.push(d);
                    if out.len() >= limit as usize {
                        break;
                    }
                }
                Ok(out)
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn update_decision_outcome(
        &self,
        id: Uuid,
        outcome_status: Option<OutcomeStatus>,
        outcome_notes: Option<String>,
        lessons_learned: Option<String>,
    ) -> Result<bool> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some(status) = outcome_status {
                    tx.execute(
                        "UPDATE decisions SET outcome_status = ?1 WHERE id = ?2",
                        rusqlite::params![status.as_str(), id],
                    )?;
                }
                if let Some(notes) = &outcome_notes {
                    tx.execute(
                        "UPDATE decisions SET outcome_notes = ?1 WHERE id = ?2",
                        rusqlite::params![notes, id],
                    )?;
                }
                if let Some(lessons) = &lessons_learned {
                    tx.execute(
                        "UPDATE decisions SET lessons_learned = ?1 WHERE id = ?2",
                        rusqlite::params![lessons, id],
                    )?;
                }
                let exists: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM decisions WHERE id = ?1",
                    rusqlite::params![id],
                    |r| r.get(0),
                )?;
                tx.commit()?;
                Ok(exists > 0)
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn delete_decision(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM decisions WHERE id = ?1", rusqlite::params![id])? > 0)
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn decision_stats(
        &self,
        project_id: Uuid,
    ) -> Result<(Vec<(String, u64)>, Vec<(String, u64)>, Vec<(String, u64)>, f32)> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let by = |column: &str| -> rusqlite::Result<Vec<(String, u64)>> {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {column}, COUNT(*) FROM decisions WHERE project_id = ?1 GROUP BY {column}"
                    ))?;
                    let mut rows = stmt.query(rusqlite::params![project_id])?;
                    let mut out = Vec::new();
                    while let Some(row) = rows.next()? {
                        out.push((row.get::<_, String>(0)?, row.get::<_, u64>(1)?));
                    }
                    Ok(out)
                };
                let by_type = by("decision_type")?;
                let by_status = by("outcome_status")?;
                let by_impact = by("impact_level")?;

                let total: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM decisions WHERE project_id = ?1",
                    rusqlite::params![project_id],
                    |r| r.get(0),
                )?;
                let successful: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM decisions WHERE project_id = ?1 AND outcome_status = 'successful'",
                    rusqlite::params![project_id],
                    |r| r.get(0),
                )?;
                let success_rate = if total == 0 {
                    0.0
                } else {
                    (successful as f32 / total as f32) * 100.0
                };
                Ok((by_type, by_status, by_impact, success_rate))
            })
            .await
            .map_err(StorageError::from)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    pub async fn insert_task(&self, task: &Task) -> Result<()> {
        let id = task.id.to_string();
        let project_id = task.project_id.to_string();
        let title = task.title.clone();
        let description = task.description.clone();
        let task_type = task.task_type.clone();
        let priority = enum_to_sql(&task.priority);
        let status = enum_to_sql(&task.status);
        let assignee = task.assignee.clone();
        let creator = task.creator.clone();
        let tags = serde_json::to_string(&task.tags).expect("serialize tags");
        let dependencies =
            serde_json::to_string(&task.dependencies).expect("serialize dependencies");
        let metadata = task.metadata.as_ref().map(|v| v.to_string());
        let created_at = task.created_at.to_rfc3339();
        let started_at = task.started_at.map(|d| d.to_rfc3339());
        let completed_at = task.completed_at.map(|d| d.to_rfc3339());

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, project_id, title, description, task_type, priority,
                        status, assignee, creator, tags, dependencies, metadata, created_at,
                        started_at, completed_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                    rusqlite::params![
                        id, project_id, title, description, task_type, priority, status, assignee,
                        creator, tags, dependencies, metadata, created_at, started_at, completed_at
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", TASK_SELECT))?;
                let mut rows = stmt.query(rusqlite::params![id])?;
                Ok(match rows.next()? {
                    Some(row) => Some(row_to_task(row)?),
                    None => None,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE project_id = ?1 ORDER BY created_at DESC",
                    TASK_SELECT
                ))?;
                let mut rows = stmt.query(rusqlite::params![project_id])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_task(row)?);
                }
                Ok(out)
            })
            .await
            .map_err(StorageError::from)
    }

    pub async fn update_task(
        &self,
        id: Uuid,
        status: Option<TaskStatus>,
        assignee: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some(status) = status {
                    if status == TaskStatus::Completed {
                        tx.execute(
                            "UPDATE tasks SET status = ?1, completed_at = ?2 WHERE id = ?3",
                            rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id],
                        )?;
                    } else {
                        tx.execute(
                            "UPDATE tasks SET status = ?1, completed_at = NULL WHERE id = ?2",
                            rusqlite::params![status.as_str(), id],
                        )?;
                    }
                    if status == TaskStatus::InProgress {
                        tx.execute(
                            "UPDATE tasks SET started_at = COALESCE(started_at, ?1) WHERE id = ?2",
                            rusqlite::params![Utc::now().to_rfc3339(), id],
                        )?;
                    }
                }
                if let Some(assignee) = &assignee {
                    tx.execute(
                        "UPDATE tasks SET assignee = ?1 WHERE id = ?2",
                        rusqlite::params![assignee, id],
                    )?;
                }
                if let Some(metadata) = &metadata {
                    tx.execute(
                        "UPDATE tasks SET metadata = ?1 WHERE id = ?2",
                        rusqlite::params![metadata.to_string(), id],
                    )?;
                }
                let exists: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE id = ?1",
                    rusqlite::params![id],
                    |r| r.get(0),
                )?;
                tx.commit()?;
                Ok(exists > 0)
            })
            .await
            .map_err(StorageError::from)
    }

    /// All-or-nothing bulk status update. Any unknown id aborts the whole
    /// transaction and no task is changed.
    pub async fn bulk_update_task_status(
        &self,
        ids: Vec<Uuid>,
        status: TaskStatus,
    ) -> Result<Vec<Uuid>> {
        let id_strs: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let outcome: std::result::Result<Vec<Uuid>, String> = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for id in &id_strs {
                    let exists: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
                        rusqlite::params![id],
                        |r| r.get(0),
                    )?;
                    if exists == 0 {
                        return Ok(Err(id.clone()));
                    }
                }
                for id in &id_strs {
                    if status == TaskStatus::Completed {
                        tx.execute(
                            "UPDATE tasks SET status = ?1, completed_at = ?2 WHERE id = ?3",
                            rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id],
                        )?;
                    } else {
                        tx.execute(
                            "UPDATE tasks SET status = ?1 WHERE id = ?2",
                            rusqlite::params![status.as_str(), id],
                        )?;
                    }
                }
                tx.commit()?;
                Ok(Ok(id_strs
                    .iter()
                    .map(|s| Uuid::parse_str(s).expect("valid uuid"))
                    .collect()))
            })
            .await
            .map_err(StorageError::from)?;

        outcome.map_err(|id| StorageError::Conflict(format!("unknown task id {id}")))
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])? > 0)
            })
            .await
            .map_err(StorageError::from)
    }
}

const CONTEXT_SELECT: &str = "SELECT id, project_id, session_id, context_type, content, tags,
    relevance_score, metadata, created_at, embedding FROM contexts";
const DECISION_SELECT: &str = "SELECT id, project_id, decision_type, title, description,
    rationale, impact_level, alternatives_considered, problem_statement, affected_components,
    tags, outcome_status, outcome_notes, lessons_learned, decision_date FROM decisions";
const TASK_SELECT: &str = "SELECT id, project_id, title, description, task_type, priority,
    status, assignee, creator, tags, dependencies, metadata, created_at, started_at,
    completed_at FROM tasks";

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let id: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let metadata_str: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;
    Ok(Project {
        id: Uuid::parse_str(&id).expect("valid uuid"),
        name: row.get(1)?,
        description: row.get(2)?,
        status: enum_from_sql(&status_str),
        git_repo_url: row.get(4)?,
        root_directory: row.get(5)?,
        metadata: metadata_str.map(|s| serde_json::from_str(&s).expect("valid json")),
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let id: String = row.get(0)?;
    let project_id: Option<String> = row.get(1)?;
    let started_at_str: String = row.get(2)?;
    let ended_at_str: Option<String> = row.get(3)?;
    let tags_str: String = row.get(7)?;
    Ok(Session {
        id: Uuid::parse_str(&id).expect("valid uuid"),
        project_id: project_id.map(|s| Uuid::parse_str(&s).expect("valid uuid")),
        started_at: parse_dt(&started_at_str),
        ended_at: ended_at_str.as_deref().map(parse_dt),
        title: row.get(4)?,
        description: row.get(5)?,
        goal: row.get(6)?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        ai_model: row.get(8)?,
        metrics: SessionMetrics {
            context_count: row.get(9)?,
            decision_count: row.get(10)?,
            duration_secs: ended_at_str
                .as_deref()
                .map(|e| (parse_dt(e) - parse_dt(&started_at_str)).num_seconds()),
        },
    })
}

fn row_to_context(row: &rusqlite::Row<'_>) -> rusqlite::Result<Context> {
    let id: String = row.get(0)?;
    let project_id: String = row.get(1)?;
    let session_id: Option<String> = row.get(2)?;
    let context_type_str: String = row.get(3)?;
    let tags_str: String = row.get(5)?;
    let metadata_str: Option<String> = row.get(7)?;
    let created_at_str: String = row.get(8)?;
    let embedding_blob: Option<Vec<u8>> = row.get(9)?;
    Ok(Context {
        id: Uuid::parse_str(&id).expect("valid uuid"),
        project_id: Uuid::parse_str(&project_id).expect("valid uuid"),
        session_id: session_id.map(|s| Uuid::parse_str(&s).expect("valid uuid")),
        context_type: enum_from_sql(&context_type_str),
        content: row.get(4)?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        relevance_score: row.get(6)?,
        metadata: metadata_str.map(|s| serde_json::from_str(&s).expect("valid json")),
        created_at: parse_dt(&created_at_str),
        embedding: embedding_blob.as_deref().map(embedding_from_blob),
    })
}

fn row_to_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<Decision> {
    let id: String = row.get(0)?;
    let project_id: String = row.get(1)?;
    let decision_type_str: String = row.get(2)?;
    let impact_level_str: String = row.get(6)?;
    let alternatives_str: String = row.get(7)?;
    let affected_str: String = row.get(9)?;
    let tags_str: String = row.get(10)?;
    let outcome_status_str: String = row.get(11)?;
    let decision_date_str: String = row.get(14)?;
    Ok(Decision {
        id: Uuid::parse_str(&id).expect("valid uuid"),
        project_id: Uuid::parse_str(&project_id).expect("valid uuid"),
        decision_type: DecisionType::parse(&decision_type_str).expect("valid decision type"),
        title: row.get(3)?,
        description: row.get(4)?,
        rationale: row.get(5)?,
        impact_level: enum_from_sql(&impact_level_str),
        alternatives_considered: serde_json::from_str::<Vec<Alternative>>(&alternatives_str)
            .unwrap_or_default(),
        problem_statement: row.get(8)?,
        affected_components: serde_json::from_str(&affected_str).unwrap_or_default(),
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        outcome_status: OutcomeStatus::parse(&outcome_status_str).unwrap_or(OutcomeStatus::Unknown),
        outcome_notes: row.get(12)?,
        lessons_learned: row.get(13)?,
        decision_date: parse_dt(&decision_date_str),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let project_id: String = row.get(1)?;
    let priority_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let tags_str: String = row.get(9)?;
    let dependencies_str: String = row.get(10)?;
    let metadata_str: Option<String> = row.get(11)?;
    let created_at_str: String = row.get(12)?;
    let started_at_str: Option<String> = row.get(13)?;
    let completed_at_str: Option<String> = row.get(14)?;
    Ok(Task {
        id: Uuid::parse_str(&id).expect("valid uuid"),
        project_id: Uuid::parse_str(&project_id).expect("valid uuid"),
        title: row.get(2)?,
        description: row.get(3)?,
        task_type: row.get(4)?,
        priority: TaskPriority::parse(&priority_str).expect("valid priority"),
        status: TaskStatus::parse(&status_str).expect("valid status"),
        assignee: row.get(7)?,
        creator: row.get(8)?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        dependencies: serde_json::from_str::<Vec<String>>(&dependencies_str)
            .unwrap_or_default()
            .into_iter()
            .map(|s| Uuid::parse_str(&s).expect("valid uuid"))
            .collect(),
        metadata: metadata_str.map(|s| serde_json::from_str(&s).expect("valid json")),
        created_at: parse_dt(&created_at_str),
        started_at: started_at_str.as_deref().map(parse_dt),
        completed_at: completed_at_str.as_deref().map(parse_dt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextType;

    #[tokio::test]
    async fn project_create_is_unique_by_name() {
        let db = StorageGateway::new_in_memory().await.unwrap();
        let p = Project::new("alpha");
        db.create_project(&p).await.unwrap();
        let dup = Project::new("alpha");
        let err = db.create_project(&dup).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn context_round_trips_and_is_recent() {
        let db = StorageGateway::new_in_memory().await.unwrap();
        let p = Project::new("alpha");
        db.create_project(&p).await.unwrap();

        let mut ctx = Context::new(p.id, ContextType::Code, "implemented JWT refresh flow");
        ctx.embedding = Some(vec![1.0; 384]);
        db.insert_context(&ctx).await.unwrap();

        let recent = db.get_recent_contexts(p.id, 5).await.unwrap();
        assert_eq!(recent[0].id, ctx.id);
    }

    #[tokio::test]
    async fn search_restricts_to_project_and_similarity_floor() {
        let db = StorageGateway::new_in_memory().await.unwrap();
        let alpha = Project::new("alpha");
        let beta = Project::new("beta");
        db.create_project(&alpha).await.unwrap();
        db.create_project(&beta).await.unwrap();

        let mut ctx = Context::new(alpha.id, ContextType::Code, "JWT refresh token implementation");
        ctx.embedding = Some(vec![1.0; 384]);
        db.insert_context(&ctx).await.unwrap();

        let hits = db
            .search_contexts(
                alpha.id,
                vec![1.0; 384],
                ContextSearchFilter::default(),
                10,
                0.5,
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].similarity >= 0.99);

        let beta_hits = db
            .search_contexts(
                beta.id,
                vec![1.0; 384],
                ContextSearchFilter::default(),
                10,
                0.0,
            )
            .await
            .unwrap();
        assert!(beta_hits.is_empty());
    }

    #[tokio::test]
    async fn bulk_update_is_all_or_nothing() {
        let db = StorageGateway::new_in_memory().await.unwrap();
        let p = Project::new("alpha");
        db.create_project(&p).await.unwrap();

        let t1 = Task::new(p.id, "t1", "chore");
        let t2 = Task::new(p.id, "t2", "chore");
        db.insert_task(&t1).await.unwrap();
        db.insert_task(&t2).await.unwrap();

        let bogus = Uuid::new_v4();
        let err = db
            .bulk_update_task_status(vec![t1.id, t2.id, bogus], TaskStatus::Completed)
            .await;
        assert!(err.is_err());

        let fetched = db.get_task(t1.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.3_f32, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn cosine_similarity_rejects_mismatched_dims() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
