// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Text-mode action parsing.
//!
//! Assistant output in text mode is a JSON envelope tagged with `type`:
//! `final`, `tool_use`, or `thought`.  Models wrap the JSON in prose, emit
//! trailing commentary, or produce no JSON at all, so the parser is total:
//! whatever cannot be understood becomes `Final` with the raw text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parsed assistant step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Final {
        message: String,
    },
    ToolUse {
        tool: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
    },
    Thought {
        content: String,
    },
}

/// Parse assistant text into an [`Action`].  Never fails.
///
/// Resolution order: the whole string as JSON, then the first
/// brace-balanced JSON object embedded in the text, then `Final{raw}`.
pub fn parse_action(text: &str) -> Action {
    let trimmed = text.trim();

    if let Some(action) = try_parse_object(trimmed) {
        return action;
    }

    if let Some(blob) = extract_json_object(trimmed) {
        if let Some(action) = try_parse_object(&blob) {
            return action;
        }
    }

    Action::Final {
        message: text.to_string(),
    }
}

/// Parse one candidate JSON string into an action.  A JSON object with an
/// unknown or missing `type` tag degrades to `None` (the caller falls back
/// to `Final{raw}`), keeping the parser total.
fn try_parse_object(candidate: &str) -> Option<Action> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value::<Action>(value).ok().map(|action| {
        match action {
            // Normalise a missing input object to {} so downstream
            // dispatch always sees an object.
            Action::ToolUse {
                tool,
                input,
                reason,
                thought,
            } => Action::ToolUse {
                tool,
                input: if input.is_null() {
                    Value::Object(Default::default())
                } else {
                    input
                },
                reason,
                thought,
            },
            other => other,
        }
    })
}

/// Extract the first brace-balanced JSON object from prose.
///
/// Walks the string once, tracking string literals and escapes, so braces
/// inside JSON strings do not confuse the balance count.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
