// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use crate::{
    driver::ResponseStream, CompletionRequest, ModelDriver, ProviderError, RequestInput,
    ResponseEvent,
};

/// Deterministic mock driver for tests and the "mock" provider id.  Echoes
/// the prompt (or last user message) back as the assistant response.
#[derive(Default)]
pub struct MockDriver;

#[async_trait]
impl ModelDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_native_tools(&self) -> bool {
        false
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let reply = match &req.input {
            RequestInput::Prompt(p) => p.clone(),
            RequestInput::Messages { messages, .. } => messages
                .iter()
                .rev()
                .find_map(|m| m.as_text())
                .unwrap_or("[no input]")
                .to_string(),
        };
        let events: Vec<Result<ResponseEvent, ProviderError>> = vec![
            Ok(ResponseEvent::TextDelta(format!("MOCK: {reply}"))),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A pre-scripted driver.  Each call to `stream` pops the next response
/// script from the front of the queue.  This lets tests specify exact event
/// sequences — including tool calls — without network access.
pub struct ScriptedDriver {
    scripts: Arc<Mutex<Vec<Vec<ResponseEvent>>>>,
    /// When set, the last script is replayed forever once the queue drains.
    /// Used to model a model that "always" answers the same way.
    repeat_last: bool,
    native: bool,
    delay: Option<Duration>,
    /// Every `CompletionRequest` seen by this driver, in call order.
    /// Written on each `stream()` call so tests can inspect what was sent.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedDriver {
    /// Build a driver from a list of response scripts.  The outer `Vec` is
    /// the ordered list of calls; the inner `Vec` is the event sequence
    /// emitted for that call.
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            repeat_last: false,
            native: false,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Declare that this driver speaks native tool calls.
    pub fn native(mut self) -> Self {
        self.native = true;
        self
    }

    /// Replay the final script indefinitely once the queue is exhausted.
    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Sleep before emitting any event.  Used by abort/timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Convenience: driver that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![vec![
            ResponseEvent::TextDelta(reply.into()),
            ResponseEvent::Done,
        ]])
        .repeating()
    }

    /// Convenience: one text body per call, in order.
    pub fn text_turns(bodies: Vec<String>) -> Self {
        Self::new(
            bodies
                .into_iter()
                .map(|b| vec![ResponseEvent::TextDelta(b), ResponseEvent::Done])
                .collect(),
        )
    }

    /// Convenience: a native tool call followed by a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            vec![
                ResponseEvent::ToolCallDelta {
                    index: 0,
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                },
                ResponseEvent::Finish(crate::FinishReason::ToolCalls),
                ResponseEvent::Done,
            ],
            vec![
                ResponseEvent::TextDelta(final_text.into()),
                ResponseEvent::Done,
            ],
        ])
        .native()
    }
}

#[async_trait]
impl ModelDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    fn supports_native_tools(&self) -> bool {
        self.native
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().unwrap().push(req);
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![
                    ResponseEvent::TextDelta("[no more scripts]".into()),
                    ResponseEvent::Done,
                ]
            } else if self.repeat_last && scripts.len() == 1 {
                scripts[0].clone()
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<Result<ResponseEvent, ProviderError>> =
            events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
