// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A structured todo item managed by the todo_write tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    /// One of: "pending", "in_progress", "completed"
    pub status: String,
}

/// Shared todo state.  Written by the todo_write tool, read by the turn
/// driver's exact-repeat loop guard.
#[derive(Debug, Default)]
pub struct TodoState {
    pub items: Vec<TodoItem>,
    /// Canonical serialisation of the last stored payload, used for
    /// byte-exact no-op detection.
    pub last_payload: Option<String>,
}

pub type TodoStore = Arc<Mutex<TodoState>>;

/// Events emitted by stateful tools to communicate changes back to the
/// turn driver, which forwards them to its observer.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    TodoUpdate(Vec<TodoItem>),
}
