// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod approval;
pub mod builtin;
pub mod classify;
pub mod dispatcher;
pub mod events;
pub mod registry;
pub mod sandbox;
pub mod tool;

pub use approval::{ApprovalGate, Approver, AutoApprover, DenyAllApprover, NOT_APPROVED};
pub use classify::{classify_command, ShellClassification};
pub use dispatcher::{ToolDispatcher, ToolResult};
pub use events::{TodoItem, TodoStore, ToolEvent};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolContext, ToolInvocation, ToolOutput};

pub use builtin::edit::{EditFileTool, ReplaceInFilesTool};
pub use builtin::fs::{ListFilesTool, ReadFileTool, ReadFilesTool, WriteFileTool};
pub use builtin::git::{GitDiffTool, GitStatusTool};
pub use builtin::run_tests::RunTestsTool;
pub use builtin::search::{FindFilesTool, GlobFilesTool, SearchFilesTool};
pub use builtin::shell::ShellTool;
pub use builtin::todo::{normalize_todo_payload, TodoWriteTool};

use std::sync::Arc;

use tokio::sync::mpsc;

/// Register the full built-in tool set with its wire-compatible names and
/// aliases.
pub fn builtin_registry(todos: TodoStore, event_tx: mpsc::Sender<ToolEvent>) -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(Arc::new(ShellTool));
    reg.register(Arc::new(ReadFileTool));
    reg.register(Arc::new(ReadFilesTool));
    reg.register(Arc::new(WriteFileTool));
    reg.register(Arc::new(EditFileTool));
    reg.register(Arc::new(ReplaceInFilesTool));
    reg.register(Arc::new(ListFilesTool));
    reg.register(Arc::new(GlobFilesTool));
    reg.register(Arc::new(FindFilesTool));
    reg.register(Arc::new(SearchFilesTool));
    reg.register(Arc::new(GitStatusTool));
    reg.register(Arc::new(GitDiffTool));
    reg.register(Arc::new(RunTestsTool));
    reg.register(Arc::new(TodoWriteTool::new(todos, event_tx)));
    reg.alias("apply_patch", "edit_file");
    reg.alias("todowrite", "todo_write");
    reg
}
