// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{TodoItem, TodoStore, ToolEvent};
use crate::tool::{Tool, ToolContext, ToolInvocation, ToolOutput};

/// Normalise a todo_write payload.
///
/// - statuses map onto {pending, in_progress, completed}; unknown → pending
/// - items with blank content are dropped
/// - missing ids are assigned `todo-<n>` in list order
///
/// Returns the normalised items plus their canonical serialisation, which
/// is what no-op detection compares byte-for-byte.  Errors are plain
/// strings so callers can feed them straight back to the model.
pub fn normalize_todo_payload(args: &Value) -> Result<(Vec<TodoItem>, String), String> {
    let Some(raw) = args.get("todos").and_then(Value::as_array) else {
        return Err("missing 'todos' array; pass a list of {id?, content, status?} items".into());
    };

    let mut items = Vec::new();
    for entry in raw {
        let content = entry
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if content.is_empty() {
            continue;
        }
        let status = match entry.get("status").and_then(Value::as_str) {
            Some("pending") => "pending",
            Some("in_progress") => "in_progress",
            Some("completed") => "completed",
            _ => "pending",
        }
        .to_string();
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("todo-{}", items.len() + 1));
        items.push(TodoItem {
            id,
            content,
            status,
        });
    }

    if items.is_empty() {
        return Err(
            "todo list is empty after normalization; provide at least one item \
             with non-blank content"
                .into(),
        );
    }

    let canonical = serde_json::to_string(&items).map_err(|e| e.to_string())?;
    Ok((items, canonical))
}

/// Session todo list.  Calling it replaces the whole list.
pub struct TodoWriteTool {
    todos: TodoStore,
    event_tx: mpsc::Sender<ToolEvent>,
}

impl TodoWriteTool {
    pub fn new(todos: TodoStore, event_tx: mpsc::Sender<ToolEvent>) -> Self {
        Self { todos, event_tx }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Create and manage the task list for the current session.\n\
         Statuses: pending, in_progress, completed. Each call replaces the\n\
         entire list. Use for multi-step work (3+ steps); skip it for\n\
         trivial or purely conversational requests."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "Todo items replacing the existing list",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "Unique id (assigned when missing)" },
                            "content": { "type": "string", "description": "Task description" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"],
                                "description": "Task status (default pending)"
                            }
                        },
                        "required": ["content"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolInvocation, _ctx: &ToolContext) -> ToolOutput {
        let (items, canonical) = match normalize_todo_payload(&call.args) {
            Ok(v) => v,
            Err(e) => return ToolOutput::err(e),
        };

        let mut state = self.todos.lock().await;
        if state.last_payload.as_deref() == Some(canonical.as_str()) {
            // Byte-identical payload: do not disturb observers.
            return ToolOutput::ok("No-op: todo list unchanged.");
        }

        debug!(count = items.len(), "todo_write");
        state.items = items.clone();
        state.last_payload = Some(canonical);
        drop(state);

        let _ = self.event_tx.send(ToolEvent::TodoUpdate(items.clone())).await;
        ToolOutput::ok(format_todos(&items))
    }
}

fn format_todos(items: &[TodoItem]) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|t| {
            let icon = match t.status.as_str() {
                "completed" => "✓",
                "in_progress" => "→",
                _ => "○",
            };
            format!("{icon} [{}] {}", t.id, t.content)
        })
        .collect();
    format!("Todos updated:\n{}", lines.join("\n"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn make_tool() -> (TodoWriteTool, TodoStore, mpsc::Receiver<ToolEvent>) {
        let todos = TodoStore::default();
        let (tx, rx) = mpsc::channel(16);
        (TodoWriteTool::new(todos.clone(), tx), todos, rx)
    }

    fn call(args: Value) -> ToolInvocation {
        ToolInvocation::new("t1", "todo_write", args)
    }

    fn ctx() -> ToolContext {
        ToolContext::new("/tmp")
    }

    // ── Normalisation ─────────────────────────────────────────────────────────

    #[test]
    fn unknown_status_becomes_pending() {
        let (items, _) = normalize_todo_payload(&json!({
            "todos": [{"content": "task", "status": "wat"}]
        }))
        .unwrap();
        assert_eq!(items[0].status, "pending");
    }

    #[test]
    fn missing_status_becomes_pending() {
        let (items, _) =
            normalize_todo_payload(&json!({"todos": [{"content": "task"}]})).unwrap();
        assert_eq!(items[0].status, "pending");
    }

    #[test]
    fn blank_content_items_are_dropped() {
        let (items, _) = normalize_todo_payload(&json!({
            "todos": [
                {"content": "  "},
                {"content": "real task"},
                {"content": ""}
            ]
        }))
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "real task");
    }

    #[test]
    fn missing_ids_are_assigned_in_order() {
        let (items, _) = normalize_todo_payload(&json!({
            "todos": [
                {"content": "a"},
                {"id": "mine", "content": "b"},
                {"content": "c"}
            ]
        }))
        .unwrap();
        assert_eq!(items[0].id, "todo-1");
        assert_eq!(items[1].id, "mine");
        assert_eq!(items[2].id, "todo-3");
    }

    #[test]
    fn all_blank_payload_is_error() {
        let err = normalize_todo_payload(&json!({"todos": [{"content": "  "}]})).unwrap_err();
        assert!(err.contains("empty after normalization"));
    }

    #[test]
    fn missing_todos_key_is_error() {
        let err = normalize_todo_payload(&json!({})).unwrap_err();
        assert!(err.contains("missing 'todos'"));
    }

    #[test]
    fn normalisation_is_idempotent() {
        let args = json!({"todos": [{"content": "a", "status": "bogus"}]});
        let (items1, canon1) = normalize_todo_payload(&args).unwrap();
        // Re-normalising the normalised form yields the same canonical bytes.
        let roundtrip = json!({ "todos": items1 });
        let (_, canon2) = normalize_todo_payload(&roundtrip).unwrap();
        assert_eq!(canon1, canon2);
    }

    // ── Tool execution ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn sets_todos_and_emits_event() {
        let (tool, todos, mut rx) = make_tool();
        let out = tool
            .execute(
                &call(json!({"todos": [
                    {"id": "1", "content": "do something", "status": "pending"},
                    {"id": "2", "content": "working", "status": "in_progress"}
                ]})),
                &ctx(),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("Todos updated"));
        assert_eq!(todos.lock().await.items.len(), 2);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ToolEvent::TodoUpdate(items) if items.len() == 2
        ));
    }

    #[tokio::test]
    async fn identical_payload_is_noop_without_event() {
        let (tool, _todos, mut rx) = make_tool();
        let payload = json!({"todos": [{"id": "1", "content": "x", "status": "pending"}]});
        tool.execute(&call(payload.clone()), &ctx()).await;
        let _ = rx.try_recv().unwrap();

        let out = tool.execute(&call(payload), &ctx()).await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("No-op"));
        assert!(rx.try_recv().is_err(), "no event on a no-op update");
    }

    #[tokio::test]
    async fn normalised_equivalent_payload_is_also_noop() {
        let (tool, _todos, mut rx) = make_tool();
        tool.execute(
            &call(json!({"todos": [{"id": "1", "content": "x", "status": "bogus"}]})),
            &ctx(),
        )
        .await;
        let _ = rx.try_recv().unwrap();

        // Different raw bytes, same normalised payload.
        let out = tool
            .execute(
                &call(json!({"todos": [{"id": "1", "content": "x", "status": "pending"}]})),
                &ctx(),
            )
            .await;
        assert!(out.content.starts_with("No-op"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_payload_is_helpful_error() {
        let (tool, _todos, _rx) = make_tool();
        let out = tool.execute(&call(json!({"todos": []})), &ctx()).await;
        assert!(out.is_error);
        assert!(out.content.contains("at least one item"));
    }
}
