// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Text-mode driver backed by a local command.
//!
//! The configured command is run through `bash -c`; the system prompt and
//! user prompt are written to its stdin and its stdout becomes the
//! completion.  There is no streaming transport underneath, so the whole
//! body is delivered as one synthetic delta.

use std::process::Stdio;

use async_trait::async_trait;
use futures::stream;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{
    driver::ResponseStream, CompletionRequest, ModelDriver, ProviderError, RequestInput,
    ResponseEvent,
};

pub struct CmdDriver {
    command: String,
}

impl CmdDriver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ModelDriver for CmdDriver {
    fn name(&self) -> &str {
        "cmd"
    }

    fn supports_native_tools(&self) -> bool {
        false
    }

    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let prompt = match &req.input {
            RequestInput::Prompt(p) => p.clone(),
            // A text-mode driver should never see structured messages, but
            // flatten them rather than fail if a caller sends them anyway.
            RequestInput::Messages { messages, .. } => messages
                .iter()
                .filter_map(|m| m.as_text())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        let stdin_body = format!("{}\n\n{}", req.system_prompt, prompt);

        debug!(cmd = %self.command, bytes = stdin_body.len(), "invoking cmd provider");

        let mut child = Command::new("bash")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::Transport(format!("spawn failed: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_body.as_bytes())
                .await
                .map_err(|e| ProviderError::Transport(format!("stdin write failed: {e}")))?;
            // Drop to close stdin so the child sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProviderError::Transport(format!("wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Transport(format!(
                "command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let body = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let events: Vec<Result<ResponseEvent, ProviderError>> = vec![
            Ok(ResponseEvent::TextDelta(body)),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn req(text: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "system".into(),
            input: RequestInput::Prompt(text.into()),
        }
    }

    async fn drain(mut s: ResponseStream) -> Vec<ResponseEvent> {
        let mut events = Vec::new();
        while let Some(ev) = s.next().await {
            events.push(ev.unwrap());
        }
        events
    }

    #[tokio::test]
    async fn cat_echoes_prompt_as_single_delta() {
        let d = CmdDriver::new("cat");
        let events = drain(d.stream(req("hello cmd")).await.unwrap()).await;
        assert_eq!(events.len(), 2, "synthetic delta + Done");
        match &events[0] {
            ResponseEvent::TextDelta(t) => {
                assert!(t.contains("system"));
                assert!(t.contains("hello cmd"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events[1], ResponseEvent::Done));
    }

    #[tokio::test]
    async fn failing_command_is_transport_error() {
        let d = CmdDriver::new("exit 3");
        let err = match d.stream(req("x")).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn stderr_is_included_in_error_message() {
        let d = CmdDriver::new("echo boom >&2; exit 1");
        let err = match d.stream(req("x")).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(err.to_string().contains("boom"));
    }
}
