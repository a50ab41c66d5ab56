// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::Serialize;
use serde_json::Value;

use piecode_tools::TodoItem;

/// Typed event stream emitted by the core for observers (UI, trace).
///
/// Every payload is serialisable so observers can persist events verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A provider call is about to be made in the given stage
    /// ("loop", "finalize", "compact").
    ModelCall { stage: String },
    /// The optional plan step is running.
    PlanningCall,
    /// The plan produced for this turn.
    Plan { text: String },
    /// Progress note from the planning step.
    PlanProgress { text: String },
    /// Request payload summary, emitted before each provider call.
    LlmRequest { stage: String, payload: Value },
    /// One streamed text delta.
    LlmResponseDelta { text: String },
    /// Response payload summary, emitted after each provider call.
    LlmResponse { stage: String, payload: Value },
    /// A thought block finished streaming.
    ThinkingDone,
    /// A thought surfaced by the model.
    Thought { text: String },
    /// The model requested a tool invocation.
    ToolUse {
        id: String,
        tool: String,
        args: Value,
        reason: String,
    },
    /// Tool execution started.
    ToolStart { id: String, tool: String },
    /// Tool execution finished.
    ToolEnd {
        id: String,
        tool: String,
        is_error: bool,
        output: String,
    },
    /// The session todo list changed.
    TodoUpdate { items: Vec<TodoItem> },
}

/// Observer callback.  Observers must not block; a panicking observer is
/// isolated and never unwinds into the turn driver.
pub type Observer = Box<dyn Fn(&CoreEvent) + Send + Sync>;

/// Deliver one event, swallowing observer panics.
pub fn emit(observer: &Observer, event: CoreEvent) {
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| observer(&event)));
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn events_serialise_with_type_tag() {
        let ev = CoreEvent::ToolStart {
            id: "tc-1".into(),
            tool: "shell".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "tool_start");
        assert_eq!(json["tool"], "shell");
    }

    #[test]
    fn delta_event_serialises() {
        let ev = CoreEvent::LlmResponseDelta { text: "hi".into() };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("llm_response_delta"));
    }

    #[test]
    fn observer_panic_is_swallowed() {
        let observer: Observer = Box::new(|_| panic!("bad observer"));
        // Must not unwind.
        emit(&observer, CoreEvent::ThinkingDone);
    }

    #[test]
    fn observer_receives_events_after_a_panicking_one() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let observer: Observer = Box::new(move |ev| {
            if matches!(ev, CoreEvent::ThinkingDone) {
                panic!("boom");
            }
            c.fetch_add(1, Ordering::SeqCst);
        });
        emit(&observer, CoreEvent::ThinkingDone);
        emit(
            &observer,
            CoreEvent::Thought {
                text: "still alive".into(),
            },
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
