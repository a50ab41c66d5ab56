// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Loop guards: short-circuits that stop the model from repeating work.
//!
//! Three overlapping guards run before every tool execution, in a fixed
//! priority order: exact todo repeat, then normalised shell repeat, then
//! A/B alternation.  The first one that trips ends the turn.

use std::path::Path;

use serde_json::Value;

use piecode_tools::normalize_todo_payload;

use crate::policy::TurnPolicy;

/// Turn result text for a repeated todo payload.
pub const TODO_UP_TO_DATE: &str = "Todo list is already up to date";

/// How many recent tool signatures the alternation detector looks at.
const RECENT_WINDOW: usize = 8;

/// Normalise a shell command for repeat detection.
///
/// Strips a leading `cd <workspace> &&` prefix (models love to re-anchor
/// themselves) and collapses whitespace runs, so `git status` and
/// `cd /ws && git  status` produce the same signature.
pub fn normalize_shell_signature(command: &str, workspace: &Path) -> String {
    let mut cmd = command.trim();

    let ws = workspace.to_string_lossy();
    for prefix in [
        format!("cd {ws} &&"),
        format!("cd '{ws}' &&"),
        format!("cd \"{ws}\" &&"),
    ] {
        if let Some(rest) = cmd.strip_prefix(prefix.as_str()) {
            cmd = rest.trim_start();
            break;
        }
    }

    cmd.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// What the guards decided for one pending tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Proceed,
    /// Exact todo repeat: end the turn with [`TODO_UP_TO_DATE`].
    TodoUpToDate,
    /// Normalised shell repeat or alternation: end the turn with a message
    /// containing "same verified step result".
    RepeatedStep { message: String },
}

/// Per-turn guard memory.
#[derive(Debug, Default)]
pub struct GuardState {
    /// Normalised signatures of shell commands executed this turn.
    shell_signatures: Vec<String>,
    /// `(tool, canonical args)` of every executed call, for alternation
    /// detection across tools.
    tool_pairs: Vec<(String, String)>,
}

impl GuardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate all guards for a pending call.  Priority is encoded here
    /// explicitly: exact > normalised > alternation.
    pub fn check(
        &self,
        tool: &str,
        args: &Value,
        workspace: &Path,
        last_todo_payload: Option<&str>,
    ) -> GuardVerdict {
        // 1. Exact repeat on todo_write.
        if tool == "todo_write" || tool == "todowrite" {
            if let (Ok((_, canonical)), Some(last)) =
                (normalize_todo_payload(args), last_todo_payload)
            {
                if canonical == last {
                    return GuardVerdict::TodoUpToDate;
                }
            }
        }

        // 2. Normalised shell repeat.
        if tool == "shell" {
            if let Some(command) = args.get("command").and_then(Value::as_str) {
                let sig = normalize_shell_signature(command, workspace);
                if self.shell_signatures.contains(&sig) {
                    return GuardVerdict::RepeatedStep {
                        message: format!(
                            "`{sig}` was already executed this turn; reusing the \
                             same verified step result instead of running it again."
                        ),
                    };
                }
            }
        }

        // 3. Alternation: the new call equals the one from two steps ago
        // (A,B,A) — the model is cycling between two already-verified steps.
        let pair = (tool.to_string(), canonical_args(args));
        let recent: Vec<&(String, String)> =
            self.tool_pairs.iter().rev().take(RECENT_WINDOW).collect();
        if recent.len() >= 2 && *recent[1] == pair && *recent[0] != pair {
            return GuardVerdict::RepeatedStep {
                message: format!(
                    "The `{tool}` call alternates with the previous step and was \
                     already verified; reusing the same verified step result."
                ),
            };
        }

        GuardVerdict::Proceed
    }

    /// Record an executed call.
    pub fn record(&mut self, tool: &str, args: &Value, workspace: &Path) {
        if tool == "shell" {
            if let Some(command) = args.get("command").and_then(Value::as_str) {
                self.shell_signatures
                    .push(normalize_shell_signature(command, workspace));
            }
        }
        self.tool_pairs
            .push((tool.to_string(), canonical_args(args)));
    }

    pub fn shell_signatures(&self) -> &[String] {
        &self.shell_signatures
    }
}

fn canonical_args(args: &Value) -> String {
    args.to_string()
}

/// Budget check, kept beside the other guards so the driver evaluates all
/// stop conditions in one place.
pub fn budget_exhausted(tool_calls_used: u32, policy: &TurnPolicy) -> bool {
    tool_calls_used >= policy.max_tool_calls
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ws() -> std::path::PathBuf {
        std::path::PathBuf::from("/work/project")
    }

    // ── Signature normalisation ───────────────────────────────────────────────

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(
            normalize_shell_signature("git   status  ", &ws()),
            "git status"
        );
    }

    #[test]
    fn leading_cd_workspace_prefix_is_stripped() {
        assert_eq!(
            normalize_shell_signature("cd /work/project && git status", &ws()),
            "git status"
        );
        assert_eq!(
            normalize_shell_signature("cd '/work/project' && git status", &ws()),
            "git status"
        );
    }

    #[test]
    fn cd_to_other_directory_is_not_stripped() {
        let sig = normalize_shell_signature("cd /elsewhere && git status", &ws());
        assert!(sig.starts_with("cd /elsewhere"));
    }

    // ── Normalised shell repeat ───────────────────────────────────────────────

    #[test]
    fn first_execution_proceeds() {
        let state = GuardState::new();
        let v = state.check("shell", &json!({"command": "git status"}), &ws(), None);
        assert_eq!(v, GuardVerdict::Proceed);
    }

    #[test]
    fn repeat_after_execution_trips() {
        let mut state = GuardState::new();
        state.record("shell", &json!({"command": "git status"}), &ws());
        let v = state.check("shell", &json!({"command": "git status"}), &ws(), None);
        match v {
            GuardVerdict::RepeatedStep { message } => {
                assert!(message.contains("same verified step result"));
            }
            other => panic!("expected RepeatedStep, got {other:?}"),
        }
    }

    #[test]
    fn cd_prefixed_variant_counts_as_repeat() {
        let mut state = GuardState::new();
        state.record("shell", &json!({"command": "git status"}), &ws());
        let v = state.check(
            "shell",
            &json!({"command": "cd /work/project && git status"}),
            &ws(),
            None,
        );
        assert!(matches!(v, GuardVerdict::RepeatedStep { .. }));
    }

    #[test]
    fn different_command_proceeds() {
        let mut state = GuardState::new();
        state.record("shell", &json!({"command": "git status"}), &ws());
        let v = state.check("shell", &json!({"command": "git diff"}), &ws(), None);
        assert_eq!(v, GuardVerdict::Proceed);
    }

    // ── Exact todo repeat ─────────────────────────────────────────────────────

    #[test]
    fn identical_todo_payload_trips() {
        let args = json!({"todos": [{"id": "1", "content": "x", "status": "pending"}]});
        let (_, canonical) = normalize_todo_payload(&args).unwrap();
        let state = GuardState::new();
        let v = state.check("todo_write", &args, &ws(), Some(&canonical));
        assert_eq!(v, GuardVerdict::TodoUpToDate);
    }

    #[test]
    fn todo_alias_also_checked() {
        let args = json!({"todos": [{"id": "1", "content": "x", "status": "pending"}]});
        let (_, canonical) = normalize_todo_payload(&args).unwrap();
        let state = GuardState::new();
        let v = state.check("todowrite", &args, &ws(), Some(&canonical));
        assert_eq!(v, GuardVerdict::TodoUpToDate);
    }

    #[test]
    fn changed_todo_payload_proceeds() {
        let old = json!({"todos": [{"id": "1", "content": "x", "status": "pending"}]});
        let (_, canonical) = normalize_todo_payload(&old).unwrap();
        let new = json!({"todos": [{"id": "1", "content": "x", "status": "completed"}]});
        let state = GuardState::new();
        let v = state.check("todo_write", &new, &ws(), Some(&canonical));
        assert_eq!(v, GuardVerdict::Proceed);
    }

    // ── Alternation ───────────────────────────────────────────────────────────

    #[test]
    fn a_b_a_pattern_trips_for_non_shell_tools() {
        let mut state = GuardState::new();
        let a = json!({"path": "a.txt"});
        let b = json!({"path": "b.txt"});
        state.record("read_file", &a, &ws());
        state.record("read_file", &b, &ws());
        let v = state.check("read_file", &a, &ws(), None);
        assert!(matches!(v, GuardVerdict::RepeatedStep { .. }));
    }

    #[test]
    fn a_b_c_pattern_proceeds() {
        let mut state = GuardState::new();
        state.record("read_file", &json!({"path": "a.txt"}), &ws());
        state.record("read_file", &json!({"path": "b.txt"}), &ws());
        let v = state.check("read_file", &json!({"path": "c.txt"}), &ws(), None);
        assert_eq!(v, GuardVerdict::Proceed);
    }

    #[test]
    fn immediate_non_shell_repeat_is_not_alternation() {
        // A,A is handled by the repeat guards (for shell) or allowed (other
        // tools may legitimately be re-run after an edit); alternation only
        // fires on A,B,A.
        let mut state = GuardState::new();
        let a = json!({"path": "a.txt"});
        state.record("read_file", &a, &ws());
        let v = state.check("read_file", &a, &ws(), None);
        assert_eq!(v, GuardVerdict::Proceed);
    }

    // ── Priority ──────────────────────────────────────────────────────────────

    #[test]
    fn exact_todo_guard_beats_alternation() {
        let args = json!({"todos": [{"id": "1", "content": "x", "status": "pending"}]});
        let (_, canonical) = normalize_todo_payload(&args).unwrap();
        let mut state = GuardState::new();
        // Set up an alternation pattern that would also trip.
        state.record("todo_write", &args, &ws());
        state.record("shell", &json!({"command": "ls"}), &ws());
        let v = state.check("todo_write", &args, &ws(), Some(&canonical));
        assert_eq!(v, GuardVerdict::TodoUpToDate, "exact beats alternation");
    }

    #[test]
    fn normalized_shell_guard_beats_alternation() {
        let mut state = GuardState::new();
        state.record("shell", &json!({"command": "git status"}), &ws());
        state.record("shell", &json!({"command": "git diff"}), &ws());
        // A,B,A: both the normalised-repeat and alternation guards match;
        // the message must be the normalised-repeat one ("was already
        // executed"), proving the priority order.
        let v = state.check("shell", &json!({"command": "git status"}), &ws(), None);
        match v {
            GuardVerdict::RepeatedStep { message } => {
                assert!(message.contains("already executed"));
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    // ── Budget ────────────────────────────────────────────────────────────────

    #[test]
    fn budget_exhaustion_boundary() {
        let policy = &*crate::policy::GENERIC;
        assert!(!budget_exhausted(5, policy));
        assert!(budget_exhausted(6, policy));
        assert!(budget_exhausted(7, policy));
    }
}
