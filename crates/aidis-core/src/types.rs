use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub git_repo_url: Option<String>,
    pub root_directory: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: ProjectStatus::Active,
            git_repo_url: None,
            root_directory: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub context_count: u64,
    pub decision_count: u64,
    pub duration_secs: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub goal: Option<String>,
    pub tags: Vec<String>,
    pub ai_model: Option<String>,
    pub metrics: SessionMetrics,
}

impl Session {
    pub fn new(project_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            started_at: Utc::now(),
            ended_at: None,
            title: None,
            description: None,
            goal: None,
            tags: Vec::new(),
            ai_model: None,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Code,
    Decision,
    Error,
    Discussion,
    Planning,
    Completion,
    Milestone,
    Reflections,
    Handoff,
}

impl ContextType {
    pub const ALL: &'static [ContextType] = &[
        ContextType::Code,
        ContextType::Decision,
        ContextType::Error,
        ContextType::Discussion,
        ContextType::Planning,
        ContextType::Completion,
        ContextType::Milestone,
        ContextType::Reflections,
        ContextType::Handoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Code => "code",
            ContextType::Decision => "decision",
            ContextType::Error => "error",
            ContextType::Discussion => "discussion",
            ContextType::Planning => "planning",
            ContextType::Completion => "completion",
            ContextType::Milestone => "milestone",
            ContextType::Reflections => "reflections",
            ContextType::Handoff => "handoff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

pub const MAX_CONTEXT_CONTENT_LEN: usize = 10_000;
pub const MAX_CONTEXT_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;
pub const CONTEXT_EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: Uuid,
    pub project_id: Uuid,
    pub session_id: Option<Uuid>,
    pub context_type: ContextType,
    pub content: String,
    pub tags: Vec<String>,
    pub relevance_score: i32,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
}

impl Context {
    pub fn new(project_id: Uuid, context_type: ContextType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            session_id: None,
            context_type,
            content: content.into(),
            tags: Vec::new(),
            relevance_score: 5,
            metadata: None,
            created_at: Utc::now(),
            embedding: None,
        }
    }
}

/// A context row returned by a similarity search, carrying its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredContext {
    #[serde(flatten)]
    pub context: Context,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f32,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Architecture,
    Library,
    Framework,
    Database,
    Api,
    Format,
    Deployment,
    Security,
    Process,
    Naming,
    Tooling,
    Performance,
    Refactoring,
    UiUx,
    Other,
}

impl DecisionType {
    pub const ALL: &'static [DecisionType] = &[
        DecisionType::Architecture,
        DecisionType::Library,
        DecisionType::Framework,
        DecisionType::Database,
        DecisionType::Api,
        DecisionType::Format,
        DecisionType::Deployment,
        DecisionType::Security,
        DecisionType::Process,
        DecisionType::Naming,
        DecisionType::Tooling,
        DecisionType::Performance,
        DecisionType::Refactoring,
        DecisionType::UiUx,
        DecisionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Architecture => "architecture",
            DecisionType::Library => "library",
            DecisionType::Framework => "framework",
            DecisionType::Database => "database",
            DecisionType::Api => "api",
            DecisionType::Format => "format",
            DecisionType::Deployment => "deployment",
            DecisionType::Security => "security",
            DecisionType::Process => "process",
            DecisionType::Naming => "naming",
            DecisionType::Tooling => "tooling",
            DecisionType::Performance => "performance",
            DecisionType::Refactoring => "refactoring",
            DecisionType::UiUx => "ui_ux",
            DecisionType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Unknown,
    Successful,
    Failed,
    Mixed,
    TooEarly,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Unknown => "unknown",
            OutcomeStatus::Successful => "successful",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Mixed => "mixed",
            OutcomeStatus::TooEarly => "too_early",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "unknown" => OutcomeStatus::Unknown,
            "successful" => OutcomeStatus::Successful,
            "failed" => OutcomeStatus::Failed,
            "mixed" => OutcomeStatus::Mixed,
            "too_early" => OutcomeStatus::TooEarly,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub name: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub reason_rejected: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub project_id: Uuid,
    pub decision_type: DecisionType,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub impact_level: ImpactLevel,
    pub alternatives_considered: Vec<Alternative>,
    pub problem_statement: Option<String>,
    pub affected_components: Vec<String>,
    pub tags: Vec<String>,
    pub outcome_status: OutcomeStatus,
    pub outcome_notes: Option<String>,
    pub lessons_learned: Option<String>,
    pub decision_date: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "low" => TaskPriority::Low,
            "medium" => TaskPriority::Medium,
            "high" => TaskPriority::High,
            "urgent" => TaskPriority::Urgent,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "todo" => TaskStatus::Todo,
            "in_progress" => TaskStatus::InProgress,
            "blocked" => TaskStatus::Blocked,
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub creator: Option<String>,
    pub tags: Vec<String>,
    pub dependencies: Vec<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(project_id: Uuid, title: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            description: None,
            task_type: task_type.into(),
            priority: TaskPriority::Medium,
            status: TaskStatus::Todo,
            assignee: None,
            creator: None,
            tags: Vec::new(),
            dependencies: Vec::new(),
            metadata: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}
