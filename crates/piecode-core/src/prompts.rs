// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;

use piecode_model::{Message, MessageContent, Role};

/// Summarisation instruction used by history compaction.
pub const SUMMARIZE_PROMPT: &str =
    "You are a context compaction assistant. Summarise the following conversation \
     history as a short bullet list of constraints, decisions, and unresolved \
     items. Preserve file names, commands, and error messages verbatim where \
     they matter. The summary will replace the original history.";

/// Banner that opens the evidence block of a finalize prompt.  Wire-stable.
pub const EVIDENCE_BANNER: &str = "Collected evidence:";

/// Text-mode action protocol, appended to the system prompt when the
/// provider has no native tool calls.
const ACTION_PROTOCOL: &str = "\
Respond with exactly one JSON object per turn:\n\
- {\"type\": \"tool_use\", \"tool\": \"<name>\", \"input\": {...}, \"reason\": \"<why>\"}\n\
- {\"type\": \"thought\", \"content\": \"<reasoning, no action taken>\"}\n\
- {\"type\": \"final\", \"message\": \"<your answer to the user>\"}\n\
Do not wrap the JSON in markdown fences or prose.";

/// Inputs assembled into the system prompt for one turn.
#[derive(Debug, Default)]
pub struct PromptContext<'a> {
    pub workspace_root: Option<&'a Path>,
    /// Opaque project instructions injected verbatim.
    pub project_instructions: Option<&'a str>,
    /// Opaque active-skill texts injected verbatim.
    pub skills: &'a [String],
    /// Per-turn policy note.
    pub policy_note: &'a str,
    /// Plan produced by the optional planning step.
    pub plan: Option<&'a str>,
    /// Include the text-mode action protocol.
    pub text_mode: bool,
    /// Tool names available this turn (text mode lists them explicitly).
    pub tool_names: &'a [String],
}

/// Build the system prompt for one provider call.
pub fn system_prompt(ctx: &PromptContext) -> String {
    let mut out = String::from(
        "You are piecode, an AI coding assistant operating inside the user's \
         workspace. Be precise and keep answers short. Use tools to gather \
         evidence before answering; never invent command output.",
    );

    if let Some(root) = ctx.workspace_root {
        out.push_str(&format!("\n\nWorkspace root: {}", root.display()));
    }
    if !ctx.policy_note.is_empty() {
        out.push_str("\n\n");
        out.push_str(ctx.policy_note);
    }
    if let Some(instructions) = ctx.project_instructions {
        out.push_str("\n\nProject instructions:\n");
        out.push_str(instructions);
    }
    for skill in ctx.skills {
        out.push_str("\n\nActive skill:\n");
        out.push_str(skill);
    }
    if let Some(plan) = ctx.plan {
        out.push_str("\n\nPlan for this turn:\n");
        out.push_str(plan);
    }
    if ctx.text_mode {
        out.push_str("\n\n");
        out.push_str(ACTION_PROTOCOL);
        if !ctx.tool_names.is_empty() {
            out.push_str(&format!(
                "\nAvailable tools: {}",
                ctx.tool_names.join(", ")
            ));
        }
    }
    out
}

/// Render the message log as a plain-text transcript for text-mode
/// requests and compaction prompts.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
            };
            let text = match &m.content {
                MessageContent::Text(t) => t.clone(),
                MessageContent::ToolCall { function, .. } => {
                    format!("[tool_call: {}({})]", function.name, function.arguments)
                }
                MessageContent::ToolResult { content, .. } => {
                    format!("[tool_result: {content}]")
                }
            };
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the finalize sub-turn prompt: instructions, then the evidence
/// block opened by [`EVIDENCE_BANNER`].
pub fn finalize_prompt(evidence: &[(String, String)], require_commit_message: bool) -> String {
    let mut out = String::from(
        "You have finished gathering evidence for this task. Do not call any \
         more tools. Write the final answer for the user, grounded only in \
         the evidence below.",
    );
    if require_commit_message {
        out.push_str(
            "\nEnd your answer with a line of the form \
             \"Suggested commit message: ...\".",
        );
    }
    out.push_str("\n\n");
    out.push_str(EVIDENCE_BANNER);
    for (label, result) in evidence {
        out.push_str(&format!("\n\n--- {label} ---\n{result}"));
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
