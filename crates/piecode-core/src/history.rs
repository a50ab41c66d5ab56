// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use tokio_util::sync::CancellationToken;
use tracing::debug;

use piecode_model::{CompletionRequest, Message, ProviderAdapter, RequestInput, Role};

use crate::error::CoreError;
use crate::prompts;

/// Synthetic assistant prefix that opens a compacted history.
pub const CONTEXT_SUMMARY_TAG: &str = "[CONTEXT SUMMARY]";

/// Result of one compaction call.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CompactReport {
    pub compacted: bool,
    pub before_messages: usize,
    pub after_messages: usize,
    pub removed_messages: usize,
}

/// Append-only message log for one session.
///
/// Not thread-safe by design: exactly one turn mutates it at a time, and
/// the driver owns it exclusively.
#[derive(Debug, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the most recent assistant message, for the intent
    /// classifier's confirmation context.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.as_text())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Compact the log: summarise everything but the `preserve_recent`
    /// newest messages through a tool-free provider call and rebuild the
    /// log as `[summary] ++ recent`.
    ///
    /// A log with at most `preserve_recent` messages is left untouched.
    /// After a successful compaction the log holds `preserve_recent + 1`
    /// messages and its first entry is the synthetic assistant summary
    /// tagged [`CONTEXT_SUMMARY_TAG`].
    pub async fn compact(
        &mut self,
        adapter: &ProviderAdapter,
        preserve_recent: usize,
        cancel: &CancellationToken,
    ) -> Result<CompactReport, CoreError> {
        let before = self.messages.len();
        if before <= preserve_recent {
            return Ok(CompactReport {
                compacted: false,
                before_messages: before,
                after_messages: before,
                removed_messages: 0,
            });
        }

        let split = before - preserve_recent;
        let old = &self.messages[..split];
        let recent = self.messages[split..].to_vec();

        debug!(before, preserve_recent, "compacting history");
        let prompt = format!(
            "{}\n\n---\n\n{}",
            prompts::SUMMARIZE_PROMPT,
            prompts::render_transcript(old)
        );
        let completion = adapter
            .complete(
                CompletionRequest {
                    system_prompt: String::new(),
                    input: RequestInput::Prompt(prompt),
                },
                cancel,
                &mut |_| {},
            )
            .await?;

        let mut rebuilt = Vec::with_capacity(preserve_recent + 1);
        rebuilt.push(Message::assistant(format!(
            "{CONTEXT_SUMMARY_TAG}\n{}",
            completion.text
        )));
        rebuilt.extend(recent);
        self.messages = rebuilt;

        let after = self.messages.len();
        Ok(CompactReport {
            compacted: true,
            before_messages: before,
            after_messages: after,
            removed_messages: before - after,
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
