// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Stable identifier forwarded verbatim into the tool result.
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Per-turn execution environment shared by all tools.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Workspace root; every path argument resolves against (and must stay
    /// inside) this directory.
    pub workspace_root: PathBuf,
    /// The turn's abort handle.  Tools running child processes must kill
    /// them when this fires.
    pub cancel: CancellationToken,
    /// Default shell command timeout.
    pub shell_timeout_secs: u64,
    /// Upper bound for the per-call shell timeout parameter.
    pub shell_timeout_max_secs: u64,
    /// Command run by the `run_tests` tool.
    pub test_command: String,
}

impl ToolContext {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            cancel: CancellationToken::new(),
            shell_timeout_secs: 30,
            shell_timeout_max_secs: 600,
            test_command: "cargo test".into(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The result of executing a tool.  Tools never fail: internal errors are
/// reported through `is_error` and the message text, and the turn driver
/// treats them as evidence like any other result.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            content: msg.into(),
            is_error: true,
        }
    }
}

/// Describes the shape of a tool's text output so the dispatcher can build
/// a useful preview when the result exceeds the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Terminal / process output: both the preamble and the final lines
    /// matter (errors and summaries appear at the end of build output).
    HeadTail,
    /// Ordered match list: leading matches are the most relevant.
    MatchList,
    /// File content: keep a head and tail window.
    FileContent,
    /// Generic text: cut at the cap.
    #[default]
    Generic,
}

/// Trait implemented by every built-in tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// Shape of this tool's output, for preview construction.
    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }
    /// Execute the tool.  Errors must be wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
