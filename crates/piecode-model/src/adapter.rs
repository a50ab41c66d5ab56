// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    Completion, CompletionRequest, FinishReason, ModelDriver, ProviderError, ProviderToolCall,
    ResponseEvent, Usage,
};

/// Uniform completion interface over all drivers.
///
/// The adapter drives a driver's event stream to completion under a
/// wall-clock timeout and a cancellation token, invoking the caller's delta
/// callback in arrival order and accumulating the final [`Completion`].
/// Cancellation always wins over the timeout: an aborted call reports
/// [`ProviderError::Aborted`] even if the deadline has also passed.
pub struct ProviderAdapter {
    driver: Arc<dyn ModelDriver>,
    timeout: Duration,
    last_usage: Mutex<Usage>,
}

impl ProviderAdapter {
    pub fn new(driver: Arc<dyn ModelDriver>, timeout: Duration) -> Self {
        Self {
            driver,
            timeout,
            last_usage: Mutex::new(Usage::default()),
        }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    pub fn supports_native_tools(&self) -> bool {
        self.driver.supports_native_tools()
    }

    /// Best-effort usage for the most recent call.  When the transport did
    /// not report usage, a 4-chars-per-token estimate is substituted.
    /// Observability only — control flow never reads this.
    pub fn last_usage(&self) -> Usage {
        *self.last_usage.lock().unwrap()
    }

    /// Run one completion to the end.
    ///
    /// `on_delta` receives text deltas in order and must not block; it is a
    /// plain synchronous callback invoked between stream polls.  Deltas
    /// already delivered before an abort or timeout are the caller's to
    /// discard.
    pub async fn complete(
        &self,
        req: CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<Completion, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Aborted);
        }

        let request_tokens = req.approx_tokens() as u64;
        let work = self.consume(req, on_delta);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Aborted),
            res = tokio::time::timeout(self.timeout, work) => match res {
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
                Ok(inner) => inner,
            },
        };

        let (completion, reported) = outcome?;
        let usage = reported.unwrap_or(Usage {
            input_tokens: request_tokens,
            output_tokens: (completion.text.len() / 4) as u64,
        });
        *self.last_usage.lock().unwrap() = usage;
        Ok(completion)
    }

    /// Drain the driver stream, accumulating text, tool calls, and usage.
    async fn consume(
        &self,
        req: CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<(Completion, Option<Usage>), ProviderError> {
        let mut stream = self.driver.stream(req).await?;

        let mut text = String::new();
        // Keyed by the parallel-tool-call index from the provider; OpenAI
        // interleaves chunks for different calls by index.
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();
        let mut finish: Option<FinishReason> = None;
        let mut usage: Option<Usage> = None;

        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) if !delta.is_empty() => {
                    on_delta(&delta);
                    text.push_str(&delta);
                }
                ResponseEvent::TextDelta(_) => {}
                ResponseEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    let ptc = pending.entry(index).or_default();
                    if !id.is_empty() {
                        ptc.id = id;
                    }
                    if !name.is_empty() {
                        ptc.name = name;
                    }
                    ptc.args_buf.push_str(&arguments);
                }
                ResponseEvent::Finish(reason) => finish = Some(reason),
                ResponseEvent::Usage {
                    input_tokens,
                    output_tokens,
                } => {
                    usage = Some(Usage {
                        input_tokens,
                        output_tokens,
                    });
                }
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => {
                    warn!("model stream error: {e}");
                }
            }
        }

        // Flush accumulated tool calls, ordered by index.  Calls with an
        // empty name cannot be dispatched and are dropped; an empty id gets
        // a synthetic fallback so the turn can still complete.
        let mut sorted: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        let mut tool_calls = Vec::with_capacity(sorted.len());
        for (i, (_, ptc)) in sorted.into_iter().enumerate() {
            if ptc.name.is_empty() {
                warn!(tool_call_id = %ptc.id, "dropping tool call with empty name from model");
                continue;
            }
            let mut tc = ptc.finish();
            if tc.id.is_empty() {
                tc.id = format!("tc_synthetic_{i}");
                warn!(tool_name = %tc.name, "tool call had empty id; generated synthetic id");
            }
            tool_calls.push(tc);
        }

        let finish_reason = finish.unwrap_or(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });

        // A native driver may report stop with neither content nor tool
        // calls.  Return an empty text completion; the turn driver treats
        // this as "no progress" rather than an error.
        Ok((
            Completion {
                text,
                tool_calls,
                finish_reason,
            },
            usage,
        ))
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolCall {
    fn finish(self) -> ProviderToolCall {
        // Always resolve to a JSON object; sending null back to a provider
        // on the next turn causes a 400.
        let arguments = if self.args_buf.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.args_buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        tool_name = %self.name,
                        error = %e,
                        "model sent tool call with invalid JSON arguments; substituting {{}}"
                    );
                    serde_json::Value::Object(Default::default())
                }
            }
        };
        ProviderToolCall {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestInput, ScriptedDriver};

    fn req() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "sys".into(),
            input: RequestInput::Prompt("hello".into()),
        }
    }

    fn adapter(driver: ScriptedDriver) -> ProviderAdapter {
        ProviderAdapter::new(Arc::new(driver), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn accumulates_text_deltas_in_order() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::TextDelta("hel".into()),
            ResponseEvent::TextDelta("lo".into()),
            ResponseEvent::Done,
        ]]));
        let mut seen = String::new();
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |d| seen.push_str(d))
            .await
            .unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(seen, "hello");
    }

    #[tokio::test]
    async fn accumulates_tool_call_deltas_by_index() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "tc-1".into(),
                name: "shell".into(),
                arguments: r#"{"comm"#.into(),
            },
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "".into(),
                name: "".into(),
                arguments: r#"and":"ls"}"#.into(),
            },
            ResponseEvent::Finish(FinishReason::ToolCalls),
            ResponseEvent::Done,
        ]]));
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.tool_calls[0].name, "shell");
        assert_eq!(out.tool_calls[0].arguments["command"], "ls");
        assert_eq!(out.finish_reason, FinishReason::ToolCalls);
    }

    #[tokio::test]
    async fn invalid_tool_arguments_become_empty_object() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "tc-1".into(),
                name: "shell".into(),
                arguments: "{not json".into(),
            },
            ResponseEvent::Done,
        ]]));
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert!(out.tool_calls[0].arguments.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_tool_name_is_dropped() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "tc-1".into(),
                name: "".into(),
                arguments: "{}".into(),
            },
            ResponseEvent::Done,
        ]]));
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert!(out.tool_calls.is_empty());
        assert_eq!(out.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn empty_tool_id_gets_synthetic_fallback() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "".into(),
                name: "shell".into(),
                arguments: "{}".into(),
            },
            ResponseEvent::Done,
        ]]));
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert_eq!(out.tool_calls[0].id, "tc_synthetic_0");
    }

    #[tokio::test]
    async fn stop_with_no_content_yields_empty_text() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::Finish(FinishReason::Stop),
            ResponseEvent::Done,
        ]]));
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert!(out.text.is_empty());
        assert!(out.tool_calls.is_empty());
        assert_eq!(out.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn already_cancelled_token_aborts_before_transport() {
        let a = adapter(ScriptedDriver::always_text("never seen"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = a.complete(req(), &cancel, &mut |_| {}).await.unwrap_err();
        assert!(matches!(err, ProviderError::Aborted));
    }

    #[tokio::test]
    async fn cancel_during_stream_reports_aborted() {
        let a = adapter(ScriptedDriver::always_text("slow reply").with_delay(Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel2.cancel();
        });
        let err = a.complete(req(), &cancel, &mut |_| {}).await.unwrap_err();
        assert!(matches!(err, ProviderError::Aborted));
    }

    #[tokio::test]
    async fn cancellation_is_idempotent() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        cancel.cancel();
        let a = adapter(ScriptedDriver::always_text("x"));
        let err = a.complete(req(), &cancel, &mut |_| {}).await.unwrap_err();
        assert!(matches!(err, ProviderError::Aborted));
    }

    #[tokio::test]
    async fn timeout_reports_timeout_error() {
        let driver = ScriptedDriver::always_text("late").with_delay(Duration::from_secs(5));
        let a = ProviderAdapter::new(Arc::new(driver), Duration::from_millis(30));
        let err = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn abort_takes_precedence_over_timeout() {
        let driver = ScriptedDriver::always_text("late").with_delay(Duration::from_secs(5));
        let a = ProviderAdapter::new(Arc::new(driver), Duration::from_millis(25));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = a.complete(req(), &cancel, &mut |_| {}).await.unwrap_err();
        assert!(matches!(err, ProviderError::Aborted));
    }

    #[tokio::test]
    async fn usage_falls_back_to_char_heuristic() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::TextDelta("x".repeat(40)),
            ResponseEvent::Done,
        ]]));
        a.complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert_eq!(a.last_usage().output_tokens, 10);
    }

    #[tokio::test]
    async fn reported_usage_wins_over_heuristic() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::TextDelta("hi".into()),
            ResponseEvent::Usage {
                input_tokens: 123,
                output_tokens: 456,
            },
            ResponseEvent::Done,
        ]]));
        a.complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        let usage = a.last_usage();
        assert_eq!(usage.input_tokens, 123);
        assert_eq!(usage.output_tokens, 456);
    }

    #[tokio::test]
    async fn stream_error_events_are_recoverable() {
        let a = adapter(ScriptedDriver::new(vec![vec![
            ResponseEvent::Error("transient hiccup".into()),
            ResponseEvent::TextDelta("still here".into()),
            ResponseEvent::Done,
        ]]));
        let out = a
            .complete(req(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert_eq!(out.text, "still here");
    }
}
