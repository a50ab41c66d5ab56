// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool dispatch: approval gating, execution, and result capping.
//!
//! The dispatcher never returns an error — every failure mode becomes a
//! textual [`ToolResult`] the model can read.  Oversized outputs are
//! spilled to `.piecode/shell/` (never deleted; they accumulate for
//! post-mortem inspection) and replaced by a preview plus the saved path.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::approval::{ApprovalGate, NOT_APPROVED};
use crate::classify::classify_command;
use crate::registry::ToolRegistry;
use crate::tool::{OutputCategory, ToolContext, ToolInvocation};

/// Directory (workspace-relative) where oversized results are spilled.
pub const SPILL_DIR: &str = ".piecode/shell";

/// The dispatcher's answer for one tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output_text: String,
    /// Set when the tool reported a failure; the text is still in
    /// `output_text` — the driver treats errors as evidence, not exceptions.
    pub error: Option<String>,
    /// Workspace-relative path of the spill file, when the output exceeded
    /// the cap.
    pub truncated_to_file: Option<String>,
}

pub struct ToolDispatcher {
    registry: ToolRegistry,
    gate: ApprovalGate,
    result_cap_chars: usize,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, gate: ApprovalGate, result_cap_chars: usize) -> Self {
        Self {
            registry,
            gate,
            result_cap_chars,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one tool call end to end.
    pub async fn dispatch(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            // Unknown tool names produce a synthetic error result so the
            // model gets one chance to correct itself.
            let available = self.registry.names().join(", ");
            return self.failure(
                call,
                format!("unknown tool: {}; available tools: {available}", call.name),
            );
        };
        let canonical = self
            .registry
            .canonical_name(&call.name)
            .unwrap_or(&call.name)
            .to_string();

        if canonical == "shell" {
            if let Some(command) = call.args.get("command").and_then(Value::as_str) {
                let classification = classify_command(command);
                debug!(cmd = %command, ?classification, "gating shell command");
                if !self.gate.permit(command, classification).await {
                    return ToolResult {
                        tool_call_id: call.id.clone(),
                        tool_name: canonical,
                        output_text: NOT_APPROVED.to_string(),
                        error: None,
                        truncated_to_file: None,
                    };
                }
            }
        }

        let output = tool.execute(call, ctx).await;
        let (output_text, truncated_to_file) = self.cap_result(
            &output.content,
            tool.output_category(),
            &ctx.workspace_root,
        );

        ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: canonical,
            error: output.is_error.then(|| output_text.clone()),
            output_text,
            truncated_to_file,
        }
    }

    fn failure(&self, call: &ToolInvocation, msg: String) -> ToolResult {
        ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output_text: msg.clone(),
            error: Some(msg),
            truncated_to_file: None,
        }
    }

    /// Spill an oversized result under the workspace and return a preview
    /// plus the saved path.  When spilling fails the full text is returned
    /// untruncated — losing data would be worse than a long message.
    fn cap_result(
        &self,
        content: &str,
        category: OutputCategory,
        workspace: &Path,
    ) -> (String, Option<String>) {
        if self.result_cap_chars == 0 || content.len() <= self.result_cap_chars {
            return (content.to_string(), None);
        }

        let rel_path = format!(
            "{SPILL_DIR}/result-{}-{}.txt",
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8],
        );
        let abs_path = workspace.join(&rel_path);
        if let Some(parent) = abs_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("cannot create spill dir: {e}");
                return (content.to_string(), None);
            }
        }
        if let Err(e) = std::fs::write(&abs_path, content) {
            warn!("cannot write spill file: {e}");
            return (content.to_string(), None);
        }

        let preview = build_preview(content, category, self.result_cap_chars);
        let text = format!("{preview}\n[full output saved to: {rel_path}]");
        (text, Some(rel_path))
    }
}

/// Category-aware preview of an oversized result.
///
/// Terminal and file output keep a head and a tail (errors and summaries
/// appear at the end of build output); match lists keep the leading
/// matches; generic text is cut at the nearest line boundary.
fn build_preview(content: &str, category: OutputCategory, cap_chars: usize) -> String {
    let omitted = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::HeadTail | OutputCategory::FileContent => {
            let half = cap_chars / 2;
            let head_end = floor_line_boundary(content, half);
            let tail_start = ceil_line_boundary(content, content.len() - half);
            format!(
                "{}\n[... ~{omitted} bytes omitted ...]\n{}",
                &content[..head_end],
                &content[tail_start..]
            )
        }
        OutputCategory::MatchList | OutputCategory::Generic => {
            let cut = floor_line_boundary(content, cap_chars);
            format!("{}\n[... ~{omitted} bytes omitted ...]", &content[..cut])
        }
    }
}

/// Largest newline-aligned cut point ≤ `at` (falls back to `at` for a
/// single long line, snapped to a char boundary).
fn floor_line_boundary(s: &str, at: usize) -> usize {
    let at = at.min(s.len());
    match s[..at].rfind('\n') {
        Some(p) => p,
        None => {
            let mut at = at;
            while !s.is_char_boundary(at) {
                at -= 1;
            }
            at
        }
    }
}

/// Smallest newline-aligned start point ≥ `at`.
fn ceil_line_boundary(s: &str, at: usize) -> usize {
    let at = at.min(s.len());
    let mut at = at;
    while !s.is_char_boundary(at) {
        at += 1;
    }
    match s[at..].find('\n') {
        Some(p) => at + p + 1,
        None => at,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
