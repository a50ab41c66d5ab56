// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver for OpenAI-compatible chat completion APIs.
//!
//! Many providers speak the same `/chat/completions` SSE wire format with
//! native tool calls; this single driver covers them all through a base-URL
//! override.

use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    driver::ResponseStream, CompletionRequest, FinishReason, Message, MessageContent, ModelDriver,
    ProviderError, RequestInput, ResponseEvent, Role,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatDriver {
    model: String,
    api_key: Option<String>,
    chat_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatDriver {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        temperature: Option<f32>,
    ) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base = base.trim_end_matches('/');
        Self {
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            temperature: temperature.unwrap_or(0.2),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl ModelDriver for OpenAiCompatDriver {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_native_tools(&self) -> bool {
        true
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let (messages, tools) = match &req.input {
            RequestInput::Messages { messages, tools } => (
                build_wire_messages(&req.system_prompt, messages),
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect::<Vec<Value>>(),
            ),
            // Text-mode callers still work against a native endpoint: the
            // prompt becomes a single user message and no tools are sent.
            RequestInput::Prompt(p) => (
                vec![
                    json!({"role": "system", "content": req.system_prompt}),
                    json!({"role": "user", "content": p}),
                ],
                Vec::new(),
            ),
        };

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "temperature": self.temperature,
            "stream_options": { "include_usage": true },
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(
            model = %self.model,
            tool_count = tools.len(),
            message_count = messages.len(),
            "sending completion request"
        );

        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::AuthMissing(
                "API key not set; provide model.api_key or model.api_key_env in config".into(),
            )
        })?;

        let resp = self
            .client
            .post(&self.chat_url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::AuthMissing(format!(
                "provider rejected credentials ({status}): {text}"
            )));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!(
                "provider error {status}: {text}"
            )));
        }

        let byte_stream = resp.bytes_stream();
        // SSE events can be split across TCP packets.  Maintain a line
        // buffer across chunks; emit events only for complete lines.
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let events: Vec<Result<ResponseEvent, ProviderError>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(ProviderError::Transport(format!(
                        "stream read failed: {e}"
                    )))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Convert the history into the OpenAI wire-format JSON array.
///
/// Consecutive assistant `ToolCall` messages are coalesced into a single
/// assistant message with a `tool_calls` array, as the wire format requires.
fn build_wire_messages(system_prompt: &str, messages: &[Message]) -> Vec<Value> {
    let mut wire: Vec<Value> = vec![json!({"role": "system", "content": system_prompt})];

    let mut pending_tool_calls: Vec<Value> = Vec::new();
    let flush = |wire: &mut Vec<Value>, pending: &mut Vec<Value>| {
        if !pending.is_empty() {
            wire.push(json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": std::mem::take(pending),
            }));
        }
    };

    for m in messages {
        match (&m.role, &m.content) {
            (Role::Assistant, MessageContent::ToolCall {
                tool_call_id,
                function,
            }) => {
                pending_tool_calls.push(json!({
                    "id": tool_call_id,
                    "type": "function",
                    "function": {
                        "name": function.name,
                        "arguments": function.arguments,
                    }
                }));
            }
            (role, MessageContent::Text(t)) => {
                flush(&mut wire, &mut pending_tool_calls);
                let role = match role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                wire.push(json!({"role": role, "content": t}));
            }
            (_, MessageContent::ToolResult {
                tool_call_id,
                content,
            }) => {
                flush(&mut wire, &mut pending_tool_calls);
                wire.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                }));
            }
            (_, MessageContent::ToolCall { .. }) => {
                // Non-assistant tool-call messages never occur; skip.
            }
        }
    }
    flush(&mut wire, &mut pending_tool_calls);
    wire
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// Any trailing incomplete line is left in `buf` so it can be extended by
/// the next TCP chunk.
fn drain_complete_sse_lines(buf: &mut String) -> Vec<Result<ResponseEvent, ProviderError>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
///
/// Returns `None` for empty lines, comment lines, or unparseable data.
fn parse_sse_data_line(line: &str) -> Option<Result<ResponseEvent, ProviderError>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(Ok(parse_sse_chunk(&v)))
}

fn parse_sse_chunk(v: &Value) -> ResponseEvent {
    // Usage-only chunk (emitted when stream_options.include_usage = true).
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        return ResponseEvent::Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        };
    }

    let choice = &v["choices"][0];

    if let Some(reason) = choice["finish_reason"].as_str() {
        let reason = match reason {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            _ => FinishReason::Other,
        };
        return ResponseEvent::Finish(reason);
    }

    let delta = &choice["delta"];

    // Tool call delta — each SSE chunk carries one tool-call fragment; the
    // "index" field routes accumulation in the adapter.
    if let Some(tc) = delta.get("tool_calls").and_then(|a| a.get(0)) {
        return ResponseEvent::ToolCallDelta {
            index: tc["index"].as_u64().unwrap_or(0) as u32,
            id: tc["id"].as_str().unwrap_or("").to_string(),
            name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
            arguments: tc["function"]["arguments"]
                .as_str()
                .unwrap_or("")
                .to_string(),
        };
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        return ResponseEvent::TextDelta(text.to_string());
    }

    ResponseEvent::TextDelta(String::new())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionCall;

    // ── SSE parsing ───────────────────────────────────────────────────────────

    #[test]
    fn done_sentinel_parses() {
        let ev = parse_sse_data_line("data: [DONE]").unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::Done));
    }

    #[test]
    fn non_data_lines_are_ignored() {
        assert!(parse_sse_data_line(": comment").is_none());
        assert!(parse_sse_data_line("").is_none());
        assert!(parse_sse_data_line("event: ping").is_none());
    }

    #[test]
    fn text_delta_chunk_parses() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        let ev = parse_sse_data_line(line).unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t == "hi"));
    }

    #[test]
    fn tool_call_chunk_parses_with_index() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"tc9","function":{"name":"shell","arguments":"{\"c"}}]}}]}"#;
        let ev = parse_sse_data_line(line).unwrap().unwrap();
        match ev {
            ResponseEvent::ToolCallDelta {
                index, id, name, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(id, "tc9");
                assert_eq!(name, "shell");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn finish_reason_chunks_map_to_variants() {
        for (s, expected) in [
            ("stop", FinishReason::Stop),
            ("tool_calls", FinishReason::ToolCalls),
            ("length", FinishReason::Length),
            ("content_filter", FinishReason::Other),
        ] {
            let line = format!(r#"data: {{"choices":[{{"finish_reason":"{s}","delta":{{}}}}]}}"#);
            let ev = parse_sse_data_line(&line).unwrap().unwrap();
            assert!(matches!(ev, ResponseEvent::Finish(r) if r == expected), "{s}");
        }
    }

    #[test]
    fn usage_chunk_parses() {
        let line = r#"data: {"usage":{"prompt_tokens":10,"completion_tokens":4},"choices":[]}"#;
        let ev = parse_sse_data_line(line).unwrap().unwrap();
        assert!(matches!(
            ev,
            ResponseEvent::Usage {
                input_tokens: 10,
                output_tokens: 4
            }
        ));
    }

    #[test]
    fn split_sse_lines_buffer_across_chunks() {
        let mut buf = String::new();
        buf.push_str("data: {\"choices\":[{\"delta\":{\"content\":\"par");
        let events = drain_complete_sse_lines(&mut buf);
        assert!(events.is_empty(), "incomplete line must stay buffered");
        buf.push_str("tial\"}}]}\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(buf.is_empty());
    }

    // ── Wire message construction ─────────────────────────────────────────────

    #[test]
    fn system_prompt_is_first_wire_message() {
        let wire = build_wire_messages("be helpful", &[Message::user("hi")]);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[0]["content"], "be helpful");
        assert_eq!(wire[1]["role"], "user");
    }

    #[test]
    fn consecutive_tool_calls_coalesce_into_one_assistant_message() {
        let msgs = vec![
            Message {
                role: Role::Assistant,
                content: MessageContent::ToolCall {
                    tool_call_id: "a".into(),
                    function: FunctionCall {
                        name: "shell".into(),
                        arguments: "{}".into(),
                    },
                },
            },
            Message {
                role: Role::Assistant,
                content: MessageContent::ToolCall {
                    tool_call_id: "b".into(),
                    function: FunctionCall {
                        name: "read_file".into(),
                        arguments: "{}".into(),
                    },
                },
            },
            Message::tool_result("a", "out-a"),
            Message::tool_result("b", "out-b"),
        ];
        let wire = build_wire_messages("sys", &msgs);
        // system + 1 coalesced assistant + 2 tool results
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[1]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[2]["tool_call_id"], "a");
    }

    #[test]
    fn tool_result_carries_call_id() {
        let wire = build_wire_messages("s", &[Message::tool_result("tc-7", "done")]);
        assert_eq!(wire[1]["tool_call_id"], "tc-7");
        assert_eq!(wire[1]["content"], "done");
    }

    #[tokio::test]
    async fn missing_api_key_is_auth_error() {
        let d = OpenAiCompatDriver::new("m".into(), None, None, None);
        let err = match d
            .stream(CompletionRequest {
                system_prompt: "s".into(),
                input: RequestInput::Prompt("p".into()),
            })
            .await
        {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, ProviderError::AuthMissing(_)));
    }
}
