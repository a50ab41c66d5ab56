// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

/// A single message in the conversation history.
///
/// The system prompt is carried on the request, never in the log, so `Role`
/// has no system variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant message carrying one native tool call.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: id.into(),
                function: FunctionCall {
                    name: name.into(),
                    arguments: arguments.into(),
                },
            },
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: id.into(),
                content: content.into(),
            },
        }
    }

    /// Return the plain text of this message, if it is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Approximate token count used for usage accounting when the provider
    /// omits usage.  Uses a 4-chars-per-token heuristic; observability only.
    pub fn approx_tokens(&self) -> usize {
        let chars = match &self.content {
            MessageContent::Text(t) => t.len(),
            MessageContent::ToolCall { function, .. } => {
                function.name.len() + function.arguments.len()
            }
            MessageContent::ToolResult { content, .. } => content.len(),
        };
        (chars / 4).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// The content of a message.
///
/// - `Text` – plain string (most messages; in text mode also carries the
///   JSON action/tool-result envelopes)
/// - `ToolCall` – the assistant requests a tool invocation (native mode)
/// - `ToolResult` – the result of a tool call (native mode, role=tool)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolCall {
        tool_call_id: String,
        function: FunctionCall,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
}

/// A tool schema provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

// ─── Request / response types ─────────────────────────────────────────────────

/// What the provider is asked to complete.
///
/// Text mode sends one flattened prompt; native mode sends the structured
/// message log plus tool schemas.  A driver only ever sees the shape its
/// calling convention supports.
#[derive(Debug, Clone)]
pub enum RequestInput {
    /// Text mode: a single prompt string.
    Prompt(String),
    /// Native mode: structured history plus tool schemas.
    Messages {
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
    },
}

/// Request sent to a model driver.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub input: RequestInput,
}

impl CompletionRequest {
    /// Approximate size of the request in tokens (4-chars heuristic).
    pub fn approx_tokens(&self) -> usize {
        let body = match &self.input {
            RequestInput::Prompt(p) => p.len(),
            RequestInput::Messages { messages, tools } => {
                let msg_chars: usize = messages.iter().map(|m| m.approx_tokens() * 4).sum();
                let tool_chars: usize = tools
                    .iter()
                    .map(|t| t.name.len() + t.description.len() + t.parameters.to_string().len())
                    .sum();
                msg_chars + tool_chars
            }
        };
        (self.system_prompt.len() + body) / 4
    }
}

/// A single streamed event from a model driver.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text delta streamed from the model
    TextDelta(String),
    /// Part of a tool call.  Providers interleave deltas for parallel tool
    /// calls by index; arguments accumulate across deltas.
    ToolCallDelta {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// Why the model stopped, when the transport reports it
    Finish(FinishReason),
    /// Final usage statistics
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
    /// The stream finished normally
    Done,
    /// A recoverable error (non-fatal warning)
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other,
}

/// A fully accumulated tool call from a native-mode response.
#[derive(Debug, Clone)]
pub struct ProviderToolCall {
    /// Stable id forwarded back with the tool result.
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
}

/// The accumulated result of one provider call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Full assistant text (concatenation of all deltas).
    pub text: String,
    /// Native tool calls, in provider emission order.  Empty in text mode.
    pub tool_calls: Vec<ProviderToolCall>,
    pub finish_reason: FinishReason,
}

/// Token usage from one provider call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
