// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Keyword-based intent classification.
//!
//! Deterministic and pure: the same `(input, last_assistant)` pair always
//! yields the same policy.  The rule set is a data table — the driver
//! never hard-codes intent names outside this module.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::policy::{self, TurnPolicy};

/// Verbs that indicate the user wants changes, which disqualifies the
/// read-only `repo_status` fast path.
static EDITING_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(fix|edit|change|modify|update|write|create|add|remove|delete|refactor|implement|rename)\b",
    )
    .expect("static regex")
});

static GIT_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bgit status\b").expect("static regex"));

static DIFF_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)summari[sz]e\s+.*\bdiff\b|\bwhat\b\s+.*\bhappened\b").expect("static regex")
});

static COMMIT_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcommit message\b").expect("static regex"));

static COMMIT_SUGGESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcommit\b").expect("static regex"));

struct IntentRule {
    policy: &'static Lazy<TurnPolicy>,
    matches: fn(input: &str, last_assistant: Option<&str>) -> bool,
}

/// Ordered rule table; the first match wins.
static RULES: &[IntentRule] = &[
    IntentRule {
        policy: &policy::COMMIT_INTENT,
        matches: |input, last_assistant| {
            if COMMIT_MESSAGE.is_match(input) {
                return true;
            }
            // A bare "yes" confirming the assistant's commit suggestion.
            input.trim().eq_ignore_ascii_case("yes")
                && last_assistant.is_some_and(|t| COMMIT_SUGGESTION.is_match(t))
        },
    },
    IntentRule {
        policy: &policy::REPO_STATUS,
        matches: |input, _| GIT_STATUS.is_match(input) && !EDITING_VERB.is_match(input),
    },
    IntentRule {
        policy: &policy::DIFF_SUMMARY,
        matches: |input, _| DIFF_SUMMARY.is_match(input),
    },
];

/// Classify one user input, with the previous assistant message as context
/// for confirmation-style follow-ups.
pub fn classify_intent(input: &str, last_assistant: Option<&str>) -> &'static TurnPolicy {
    for rule in RULES {
        if (rule.matches)(input, last_assistant) {
            return rule.policy;
        }
    }
    &policy::GENERIC
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_status_without_editing_verbs_is_repo_status() {
        let p = classify_intent("check the status of this repo (git status)", None);
        assert_eq!(p.name, "repo_status");
    }

    #[test]
    fn git_status_is_case_insensitive() {
        assert_eq!(classify_intent("run GIT STATUS please", None).name, "repo_status");
    }

    #[test]
    fn git_status_with_editing_verb_is_generic() {
        let p = classify_intent("run git status and fix whatever is broken", None);
        assert_eq!(p.name, "generic");
    }

    #[test]
    fn summarize_diff_is_diff_summary() {
        assert_eq!(
            classify_intent("summarize the current diff for me", None).name,
            "diff_summary"
        );
        assert_eq!(
            classify_intent("summarise this diff", None).name,
            "diff_summary"
        );
    }

    #[test]
    fn what_happened_is_diff_summary() {
        assert_eq!(
            classify_intent("what has happened in this repo since yesterday?", None).name,
            "diff_summary"
        );
    }

    #[test]
    fn commit_message_request_is_commit_intent() {
        assert_eq!(
            classify_intent("write a commit message for these changes", None).name,
            "commit_intent"
        );
    }

    #[test]
    fn bare_yes_after_commit_suggestion_is_commit_intent() {
        let last = Some("Suggested commit message: fix the parser. Shall I commit?");
        assert_eq!(classify_intent("yes", last).name, "commit_intent");
        assert_eq!(classify_intent("  YES  ", last).name, "commit_intent");
    }

    #[test]
    fn bare_yes_without_commit_context_is_generic() {
        assert_eq!(classify_intent("yes", None).name, "generic");
        assert_eq!(
            classify_intent("yes", Some("The tests all pass now.")).name,
            "generic"
        );
    }

    #[test]
    fn longer_affirmative_is_not_commit_intent() {
        let last = Some("Shall I commit?");
        assert_eq!(classify_intent("yes and also run the tests", last).name, "generic");
    }

    #[test]
    fn unrelated_input_is_generic() {
        assert_eq!(
            classify_intent("refactor the parser module", None).name,
            "generic"
        );
        assert_eq!(classify_intent("", None).name, "generic");
    }

    #[test]
    fn classifier_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(classify_intent("git status", None).name, "repo_status");
        }
    }
}
