// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Declarative per-intent turn policies.
//!
//! The table is data: the driver reads whichever record the classifier
//! picked and never branches on intent names.  Adding an intent means
//! adding a record here and a rule in `intent.rs`.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Which tools a turn may use.
#[derive(Debug, Clone)]
pub enum AllowedTools {
    All,
    Only(BTreeSet<&'static str>),
}

impl AllowedTools {
    pub fn permits(&self, tool: &str) -> bool {
        match self {
            AllowedTools::All => true,
            AllowedTools::Only(set) => set.contains(tool),
        }
    }

    /// Human-readable hint for the "tool not allowed" synthetic result.
    pub fn describe(&self) -> String {
        match self {
            AllowedTools::All => "any tool".to_string(),
            AllowedTools::Only(set) => set.iter().copied().collect::<Vec<_>>().join(", "),
        }
    }
}

/// Constraints applied to one turn, derived from the user prompt.
#[derive(Debug, Clone)]
pub struct TurnPolicy {
    pub name: &'static str,
    /// Tool-call budget (1–12).  Exhausting it triggers exactly one
    /// finalize sub-turn.
    pub max_tool_calls: u32,
    pub allowed_tools: AllowedTools,
    pub disable_todos: bool,
    /// After the first executed tool call, run one finalize sub-turn with
    /// tools disabled and answer from the collected evidence.
    pub force_finalize_after_tool: bool,
    pub require_commit_message: bool,
    /// A shell command matching this pattern finalizes the turn
    /// immediately after executing.
    pub finalize_on_tool_match: Option<&'static Lazy<Regex>>,
    /// Restrict shell to the read-only git subset
    /// (`git status|diff|log|show`); other commands are replaced with an
    /// error result and do not execute.
    pub shell_read_only_git: bool,
    /// Prepended to the system prompt for this turn.
    pub note: &'static str,
}

static GIT_COMMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*git\s+commit\b").expect("static regex"));

pub static REPO_STATUS: Lazy<TurnPolicy> = Lazy::new(|| TurnPolicy {
    name: "repo_status",
    max_tool_calls: 1,
    allowed_tools: AllowedTools::Only(BTreeSet::from(["shell"])),
    disable_todos: true,
    force_finalize_after_tool: true,
    require_commit_message: false,
    finalize_on_tool_match: None,
    shell_read_only_git: false,
    note: "The user wants the repository status. Run `git status` once and \
           report what it says.",
});

pub static DIFF_SUMMARY: Lazy<TurnPolicy> = Lazy::new(|| TurnPolicy {
    name: "diff_summary",
    max_tool_calls: 2,
    allowed_tools: AllowedTools::Only(BTreeSet::from(["shell"])),
    disable_todos: true,
    force_finalize_after_tool: true,
    require_commit_message: true,
    finalize_on_tool_match: None,
    shell_read_only_git: true,
    note: "The user wants a summary of recent changes. Use read-only git \
           commands (status, diff, log, show) and then summarise.",
});

pub static COMMIT_INTENT: Lazy<TurnPolicy> = Lazy::new(|| TurnPolicy {
    name: "commit_intent",
    max_tool_calls: 1,
    allowed_tools: AllowedTools::Only(BTreeSet::from(["shell"])),
    disable_todos: true,
    force_finalize_after_tool: false,
    require_commit_message: true,
    finalize_on_tool_match: Some(&GIT_COMMIT_RE),
    shell_read_only_git: false,
    note: "The user is working towards a commit. Propose a commit message \
           derived from the staged changes.",
});

pub static GENERIC: Lazy<TurnPolicy> = Lazy::new(|| TurnPolicy {
    name: "generic",
    max_tool_calls: 6,
    allowed_tools: AllowedTools::All,
    disable_todos: false,
    force_finalize_after_tool: false,
    require_commit_message: false,
    finalize_on_tool_match: None,
    shell_read_only_git: false,
    note: "",
});

// ─── Unit tests ──────────────────────────────────────────────────────────────
