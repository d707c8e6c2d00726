//! The Tool Registry: a compile-time, read-only catalog of every tool the
//! daemon exposes. Built once at startup from [`catalog()`]; lookups are
//! O(1) map access.

use std::collections::HashMap;

use serde_json::json;

use crate::mcp::{McpTool, ToolAnnotations};

/// Coarse grouping used by `aidis_help` to present the catalog by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    Navigation,
    Context,
    Project,
    Decision,
    Task,
    Composite,
}

impl ToolCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCategory::Navigation => "navigation",
            ToolCategory::Context => "context",
            ToolCategory::Project => "project",
            ToolCategory::Decision => "decision",
            ToolCategory::Task => "task",
            ToolCategory::Composite => "composite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub category: ToolCategory,
    pub tool: McpTool,
    /// A short worked example, returned verbatim by `aidis_examples`.
    pub example: &'static str,
}

/// Read-only, compile-time table of tool definitions. Constructed once at
/// startup and shared behind an `Arc` by the Core Executor and both
/// transports.
#[derive(Debug)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for entry in catalog() {
            entries.insert(entry.tool.name.clone(), entry);
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All tools, for `tools/list`.
    pub fn list(&self) -> Vec<&McpTool> {
        let mut tools: Vec<&McpTool> = self.entries.values().map(|e| &e.tool).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Tools grouped by category, for `aidis_help`.
    pub fn by_category(&self) -> HashMap<&'static str, Vec<&str>> {
        let mut grouped: HashMap<&'static str, Vec<&str>> = HashMap::new();
        for entry in self.entries.values() {
            grouped
                .entry(entry.category.as_str())
                .or_default()
                .push(entry.tool.name.as_str());
        }
        for names in grouped.values_mut() {
            names.sort();
        }
        grouped
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn readonly() -> Option<ToolAnnotations> {
    Some(ToolAnnotations {
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(false),
    })
}

fn mutating(destructive: bool) -> Option<ToolAnnotations> {
    Some(ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(destructive),
        idempotent_hint: Some(false),
        open_world_hint: Some(false),
    })
}

fn entry(
    category: ToolCategory,
    name: &str,
    description: &str,
    input_schema: serde_json::Value,
    annotations: Option<ToolAnnotations>,
    example: &'static str,
) -> ToolEntry {
    ToolEntry {
        category,
        tool: McpTool {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            annotations,
        },
        example,
    }
}

/// The canonical catalog — the single source of truth for both transports'
/// `tools/list` responses. Adding a tool here is the entire registration
/// step; the registry is never mutated after [`ToolRegistry::new`].
pub fn catalog() -> Vec<ToolEntry> {
    vec![
        // --- Navigation -----------------------------------------------------
        entry(
            ToolCategory::Navigation,
            "aidis_ping",
            "Check that the daemon is alive and responding.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            readonly(),
            "aidis_ping() -> \"pong\"",
        ),
        entry(
            ToolCategory::Navigation,
            "aidis_status",
            "Report daemon health: database, embeddings, uptime.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            readonly(),
            "aidis_status() -> {dbHealthy: true, uptimeSecs: 3600}",
        ),
        entry(
            ToolCategory::Navigation,
            "aidis_help",
            "List every tool grouped by category.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            readonly(),
            "aidis_help() -> {context: [...], project: [...]}",
        ),
        entry(
            ToolCategory::Navigation,
            "aidis_explain",
            "Return the description and input schema for one tool.",
            json!({
                "type": "object",
                "properties": {"toolName": {"type": "string"}},
                "required": ["toolName"],
                "additionalProperties": false
            }),
            readonly(),
            "aidis_explain(toolName=\"context_store\") -> {description, inputSchema}",
        ),
        entry(
            ToolCategory::Navigation,
            "aidis_examples",
            "Return a worked example call for one tool.",
            json!({
                "type": "object",
                "properties": {"toolName": {"type": "string"}},
                "required": ["toolName"],
                "additionalProperties": false
            }),
            readonly(),
            "aidis_examples(toolName=\"task_create\") -> {example: \"...\"}",
        ),
        // --- Context ---------------------------------------------------------
        entry(
            ToolCategory::Context,
            "context_store",
            "Persist a piece of development context with its embedding.",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "minLength": 1, "maxLength": 10000},
                    "type": {"type": "string", "enum": ["code","decision","error","discussion","planning","completion","milestone","reflections","handoff"]},
                    "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 20},
                    "relevanceScore": {"type": "number"},
                    "metadata": {"type": "object"},
                    "projectId": {"type": "string"},
                    "sessionId": {"type": "string"}
                },
                "required": ["content", "type"],
                "additionalProperties": false
            }),
            mutating(false),
            "context_store(content=\"Implemented JWT refresh\", type=\"code\", tags=[\"auth\"])",
        ),
        entry(
            ToolCategory::Context,
            "context_search",
            "Semantic search over stored contexts in the current project.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "minLength": 1},
                    "type": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50},
                    "minSimilarity": {"type": "number", "minimum": 0, "maximum": 100},
                    "projectId": {"type": "string"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            readonly(),
            "context_search(query=\"refresh token implementation\", limit=5)",
        ),
        entry(
            ToolCategory::Context,
            "context_get_recent",
            "Return the most recently stored contexts, newest first.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "minimum": 1, "maximum": 20},
                    "projectId": {"type": "string"}
                },
                "additionalProperties": false
            }),
            readonly(),
            "context_get_recent(limit=5)",
        ),
        entry(
            ToolCategory::Context,
            "context_stats",
            "Totals, embedded count, and per-type breakdown for a project.",
            json!({
                "type": "object",
                "properties": {"projectId": {"type": "string"}},
                "additionalProperties": false
            }),
            readonly(),
            "context_stats(projectId=\"<uuid>\")",
        ),
        entry(
            ToolCategory::Context,
            "context_delete",
            "Delete a context, scoped to a project.",
            json!({
                "type": "object",
                "properties": {
                    "contextId": {"type": "string"},
                    "projectId": {"type": "string"}
                },
                "required": ["contextId", "projectId"],
                "additionalProperties": false
            }),
            mutating(true),
            "context_delete(contextId=\"<uuid>\", projectId=\"<uuid>\")",
        ),
        // --- Project -----------------------------------------------------------
        entry(
            ToolCategory::Project,
            "project_list",
            "List every project, optionally with aggregate stats.",
            json!({
                "type": "object",
                "properties": {"includeStats": {"type": "boolean"}},
                "additionalProperties": false
            }),
            readonly(),
            "project_list(includeStats=true)",
        ),
        entry(
            ToolCategory::Project,
            "project_create",
            "Create a new project.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "description": {"type": "string"},
                    "gitRepoUrl": {"type": "string"},
                    "rootDirectory": {"type": "string"},
                    "metadata": {"type": "object"}
                },
                "required": ["name"],
                "additionalProperties": false
            }),
            mutating(false),
            "project_create(name=\"alpha\")",
        ),
        entry(
            ToolCategory::Project,
            "project_switch",
            "Atomically switch the caller's current project.",
            json!({
                "type": "object",
                "properties": {"project": {"type": "string"}},
                "required": ["project"],
                "additionalProperties": false
            }),
            mutating(false),
            "project_switch(project=\"alpha\")",
        ),
        entry(
            ToolCategory::Project,
            "project_current",
            "Return the caller's current project, auto-selecting one if unset.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            readonly(),
            "project_current()",
        ),
        entry(
            ToolCategory::Project,
            "project_info",
            "Return full detail for one project.",
            json!({
                "type": "object",
                "properties": {"project": {"type": "string"}},
                "required": ["project"],
                "additionalProperties": false
            }),
            readonly(),
            "project_info(project=\"alpha\")",
        ),
        entry(
            ToolCategory::Project,
            "project_delete",
            "Delete a project and cascade-delete its contexts, decisions, and tasks.",
            json!({
                "type": "object",
                "properties": {"projectId": {"type": "string"}},
                "required": ["projectId"],
                "additionalProperties": false
            }),
            mutating(true),
            "project_delete(projectId=\"<uuid>\")",
        ),
        // --- Decision ----------------------------------------------------------
        entry(
            ToolCategory::Decision,
            "decision_record",
            "Record a new technical decision.",
            json!({
                "type": "object",
                "properties": {
                    "decisionType": {"type": "string"},
                    "title": {"type": "string", "minLength": 1},
                    "description": {"type": "string", "minLength": 1},
                    "rationale": {"type": "string", "minLength": 1},
                    "impactLevel": {"type": "string", "enum": ["low","medium","high","critical"]},
                    "alternativesConsidered": {"type": "array", "items": {"type": "object"}},
                    "affectedComponents": {"type": "array", "items": {"type": "string"}},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "projectId": {"type": "string"}
                },
                "required": ["decisionType", "title", "description", "rationale", "impactLevel"],
                "additionalProperties": false
            }),
            mutating(false),
            "decision_record(decisionType=\"database\", title=\"Choose Postgres\", ...)",
        ),
        entry(
            ToolCategory::Decision,
            "decision_search",
            "Free-text and structured search over recorded decisions.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "decisionType": {"type": "string"},
                    "impactLevel": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50},
                    "projectId": {"type": "string"}
                },
                "additionalProperties": false
            }),
            readonly(),
            "decision_search(query=\"postgres\")",
        ),
        entry(
            ToolCategory::Decision,
            "decision_update",
            "Record the outcome of a previously-made decision. Never mutates its original fields.",
            json!({
                "type": "object",
                "properties": {
                    "decisionId": {"type": "string"},
                    "outcomeStatus": {"type": "string", "enum": ["unknown","successful","failed","mixed","too_early"]},
                    "outcomeNotes": {"type": "string"},
                    "lessonsLearned": {"type": "string"}
                },
                "required": ["decisionId"],
                "additionalProperties": false
            }),
            mutating(false),
            "decision_update(decisionId=\"<uuid>\", outcomeStatus=\"successful\")",
        ),
        entry(
            ToolCategory::Decision,
            "decision_stats",
            "Per-type/status/impact counts and an overall success rate.",
            json!({
                "type": "object",
                "properties": {"projectId": {"type": "string"}},
                "additionalProperties": false
            }),
            readonly(),
            "decision_stats(projectId=\"<uuid>\")",
        ),
        entry(
            ToolCategory::Decision,
            "decision_delete",
            "Delete a recorded decision.",
            json!({
                "type": "object",
                "properties": {"decisionId": {"type": "string"}},
                "required": ["decisionId"],
                "additionalProperties": false
            }),
            mutating(true),
            "decision_delete(decisionId=\"<uuid>\")",
        ),
        // --- Task ----------------------------------------------------------------
        entry(
            ToolCategory::Task,
            "task_create",
            "Create a new task.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "minLength": 1},
                    "type": {"type": "string"},
                    "description": {"type": "string"},
                    "priority": {"type": "string", "enum": ["low","medium","high","urgent"]},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "dependencies": {"type": "array", "items": {"type": "string"}},
                    "estimatedHours": {"type": "number"},
                    "projectId": {"type": "string"}
                },
                "required": ["title", "type"],
                "additionalProperties": false
            }),
            mutating(false),
            "task_create(title=\"Add refresh endpoint\", type=\"feature\")",
        ),
        entry(
            ToolCategory::Task,
            "task_list",
            "List tasks, filterable by status, tag, priority, or phase.",
            json!({
                "type": "object",
                "properties": {
                    "status": {"type": "array", "items": {"type": "string"}},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "priority": {"type": "string"},
                    "phase": {"type": "string"},
                    "projectId": {"type": "string"}
                },
                "additionalProperties": false
            }),
            readonly(),
            "task_list(status=[\"todo\",\"in_progress\"])",
        ),
        entry(
            ToolCategory::Task,
            "task_update",
            "Update one task's status, assignee, or metadata.",
            json!({
                "type": "object",
                "properties": {
                    "taskId": {"type": "string"},
                    "status": {"type": "string", "enum": ["todo","in_progress","blocked","completed","cancelled"]},
                    "assignedTo": {"type": "string"},
                    "metadata": {"type": "object"}
                },
                "required": ["taskId", "status"],
                "additionalProperties": false
            }),
            mutating(false),
            "task_update(taskId=\"<uuid>\", status=\"completed\")",
        ),
        entry(
            ToolCategory::Task,
            "task_details",
            "Return full detail for one task.",
            json!({
                "type": "object",
                "properties": {
                    "taskId": {"type": "string"},
                    "projectId": {"type": "string"}
                },
                "required": ["taskId"],
                "additionalProperties": false
            }),
            readonly(),
            "task_details(taskId=\"<uuid>\")",
        ),
        entry(
            ToolCategory::Task,
            "task_bulk_update",
            "Update the status of many tasks in one all-or-nothing transaction.",
            json!({
                "type": "object",
                "properties": {
                    "taskIds": {"type": "array", "items": {"type": "string"}, "minItems": 1},
                    "status": {"type": "string", "enum": ["todo","in_progress","blocked","completed","cancelled"]}
                },
                "required": ["taskIds", "status"],
                "additionalProperties": false
            }),
            mutating(false),
            "task_bulk_update(taskIds=[\"t1\",\"t2\"], status=\"completed\")",
        ),
        entry(
            ToolCategory::Task,
            "task_progress_summary",
            "Group tasks by phase/status/priority/type/assignee with completion percentages.",
            json!({
                "type": "object",
                "properties": {
                    "groupBy": {"type": "string", "enum": ["phase","status","priority","type","assignedTo"]},
                    "projectId": {"type": "string"}
                },
                "required": ["groupBy"],
                "additionalProperties": false
            }),
            readonly(),
            "task_progress_summary(groupBy=\"phase\")",
        ),
        entry(
            ToolCategory::Task,
            "task_delete",
            "Delete a task.",
            json!({
                "type": "object",
                "properties": {"taskId": {"type": "string"}},
                "required": ["taskId"],
                "additionalProperties": false
            }),
            mutating(true),
            "task_delete(taskId=\"<uuid>\")",
        ),
        // --- Composite -----------------------------------------------------------
        entry(
            ToolCategory::Composite,
            "smart_search",
            "Search across contexts, decisions, and tasks, synthesizing a ranked result.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "minLength": 1},
                    "projectId": {"type": "string"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            readonly(),
            "smart_search(query=\"auth refresh\")",
        ),
        entry(
            ToolCategory::Composite,
            "get_recommendations",
            "Suggest next actions based on open tasks and recent decisions.",
            json!({
                "type": "object",
                "properties": {"projectId": {"type": "string"}},
                "additionalProperties": false
            }),
            readonly(),
            "get_recommendations(projectId=\"<uuid>\")",
        ),
        entry(
            ToolCategory::Composite,
            "project_insights",
            "Summarize a project's context/decision/task activity with explanations.",
            json!({
                "type": "object",
                "properties": {"projectId": {"type": "string"}},
                "additionalProperties": false
            }),
            readonly(),
            "project_insights(projectId=\"<uuid>\")",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_canonical_names() {
        let reg = ToolRegistry::new();
        for name in [
            "aidis_ping",
            "aidis_status",
            "aidis_help",
            "aidis_explain",
            "aidis_examples",
            "context_store",
            "context_search",
            "context_get_recent",
            "context_stats",
            "context_delete",
            "project_list",
            "project_create",
            "project_switch",
            "project_current",
            "project_info",
            "project_delete",
            "decision_record",
            "decision_search",
            "decision_update",
            "decision_stats",
            "decision_delete",
            "task_create",
            "task_list",
            "task_update",
            "task_details",
            "task_bulk_update",
            "task_progress_summary",
            "task_delete",
            "smart_search",
            "get_recommendations",
            "project_insights",
        ] {
            assert!(reg.contains(name), "missing tool: {name}");
        }
        assert_eq!(reg.len(), 31);
    }

    #[test]
    fn lookups_are_exact_and_missing_is_none() {
        let reg = ToolRegistry::new();
        assert!(reg.get("context_store").is_some());
        assert!(reg.get("does_not_exist").is_none());
    }

    #[test]
    fn by_category_groups_context_tools() {
        let reg = ToolRegistry::new();
        let grouped = reg.by_category();
        assert!(grouped["context"].contains(&"context_store"));
        assert!(grouped["task"].contains(&"task_bulk_update"));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let reg = ToolRegistry::new();
        let names: Vec<&str> = reg.list().iter().map(|t| t.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
