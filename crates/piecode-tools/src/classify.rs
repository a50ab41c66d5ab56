// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shell command classification.
//!
//! A command is normalised (trailing `2>/dev/null` stripped, leading
//! `VAR=value` assignments removed, pipelines split on unquoted operators)
//! and every segment is classified by its first token.  The aggregate is
//! dangerous if any segment is dangerous, safe only if every segment is
//! safe, and standard otherwise.
//!
//! Safe commands run without asking even when auto-approval is globally
//! off; dangerous commands always ask even when it is on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellClassification {
    Safe,
    Standard,
    Dangerous,
}

/// Classify a full shell command string.
pub fn classify_command(command: &str) -> ShellClassification {
    let trimmed = strip_trailing_null_redirect(command);
    let segments = split_unquoted(trimmed);

    let mut saw_segment = false;
    let mut all_safe = true;
    for seg in &segments {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        saw_segment = true;
        match classify_segment(seg) {
            ShellClassification::Dangerous => return ShellClassification::Dangerous,
            ShellClassification::Safe => {}
            ShellClassification::Standard => all_safe = false,
        }
    }

    if saw_segment && all_safe {
        ShellClassification::Safe
    } else {
        ShellClassification::Standard
    }
}

/// Strip a trailing `2>/dev/null` (with or without a space after `2>`).
fn strip_trailing_null_redirect(command: &str) -> &str {
    let t = command.trim_end();
    for suffix in ["2>/dev/null", "2> /dev/null"] {
        if let Some(rest) = t.strip_suffix(suffix) {
            return rest.trim_end();
        }
    }
    t
}

/// Split on unquoted `|`, `&&`, `||`, `;`.
fn split_unquoted(command: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '\\' if !in_single => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' | '&' | ';' if !in_single && !in_double => {
                // Consume the second char of "||" / "&&"; a lone "&"
                // (background) also ends the segment.
                if (c == '|' && chars.peek() == Some(&'|'))
                    || (c == '&' && chars.peek() == Some(&'&'))
                {
                    chars.next();
                }
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// True for tokens of the form `VAR=value` with a valid identifier name.
fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.chars().next().unwrap().is_ascii_digit()
        }
        None => false,
    }
}

fn classify_segment(segment: &str) -> ShellClassification {
    let tokens: Vec<&str> = segment
        .split_whitespace()
        .skip_while(|t| is_env_assignment(t))
        .collect();
    let Some(&first) = tokens.first() else {
        return ShellClassification::Safe;
    };

    // Strip a path prefix: "/usr/bin/rm" classifies as "rm".
    let cmd = first.rsplit('/').next().unwrap_or(first);

    match cmd {
        "git" => classify_git(&tokens),
        "curl" => {
            // Writing the response to disk is what makes curl dangerous.
            if tokens.iter().any(|t| *t == "-o" || *t == "--output") {
                ShellClassification::Dangerous
            } else {
                ShellClassification::Standard
            }
        }
        "wget" => {
            if tokens.iter().any(|t| *t == "-O") {
                ShellClassification::Dangerous
            } else {
                ShellClassification::Standard
            }
        }
        "pwd" | "ls" | "cat" | "echo" | "head" | "tail" | "wc" | "sed" | "awk" | "grep"
        | "find" | "file" | "stat" | "which" | "date" | "uname" => ShellClassification::Safe,
        "rm" | "rmdir" | "mv" | "chmod" | "chown" | "dd" | "ssh" | "scp" | "nc" | "eval"
        | "exec" | "source" => ShellClassification::Dangerous,
        c if c.starts_with("mkfs") => ShellClassification::Dangerous,
        _ => ShellClassification::Standard,
    }
}

/// Subcommand-sensitive classification for git.
fn classify_git(tokens: &[&str]) -> ShellClassification {
    let Some(&sub) = tokens.get(1) else {
        return ShellClassification::Standard;
    };
    match sub {
        "status" | "diff" | "log" | "show" => ShellClassification::Safe,
        "commit" | "push" => ShellClassification::Dangerous,
        "reset" if tokens.contains(&"--hard") => ShellClassification::Dangerous,
        "clean" if tokens.iter().any(|t| t.starts_with('-') && t.contains('f')) => {
            ShellClassification::Dangerous
        }
        _ => ShellClassification::Standard,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
