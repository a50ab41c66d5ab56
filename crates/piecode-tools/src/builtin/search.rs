// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::sandbox;
use crate::tool::{OutputCategory, Tool, ToolContext, ToolInvocation, ToolOutput};

/// Caps keep worst-case traversals bounded; the omission notice tells the
/// model how to narrow the query.
const MAX_FILE_RESULTS: usize = 500;
const MAX_MATCH_RESULTS: usize = 200;

/// Directories never traversed.
fn skip_dir(name: &str) -> bool {
    name == ".git" || name == ".piecode" || name == "target" || name == "node_modules"
}

fn walk(root: &std::path::Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(skip_dir)
                    .unwrap_or(false)
        })
        .filter_map(Result::ok)
}

/// Convert a simple shell glob pattern to a [`Regex`].
/// `*` matches within a path segment, `**` crosses segments, `?` one char.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Swallow a following '/' so "**/foo" also matches "foo".
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

fn relative<'a>(root: &std::path::Path, path: &'a std::path::Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

fn listing(mut hits: Vec<String>, cap: usize, what: &str) -> String {
    if hits.is_empty() {
        return format!("no {what} found");
    }
    let total = hits.len();
    let capped = total > cap;
    hits.truncate(cap);
    let mut out = hits.join("\n");
    if capped {
        out.push_str(&format!(
            "\n[... {} more {what}; narrow the pattern to see them ...]",
            total - cap
        ));
    }
    out
}

/// Match workspace-relative paths against a glob pattern.
pub struct GlobFilesTool;

#[async_trait]
impl Tool for GlobFilesTool {
    fn name(&self) -> &str {
        "glob_files"
    }

    fn description(&self) -> &str {
        "Find files whose workspace-relative path matches a glob pattern,\n\
         e.g. 'src/**/*.rs' or '*.toml'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Glob pattern (* ? **)" }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(pattern) = call.args.get("pattern").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'pattern'");
        };
        let Some(re) = glob_to_regex(pattern) else {
            return ToolOutput::err(format!("invalid glob pattern: {pattern}"));
        };

        let mut hits = Vec::new();
        for entry in walk(&ctx.workspace_root) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative(&ctx.workspace_root, entry.path());
            if re.is_match(&rel) {
                hits.push(rel);
            }
        }
        hits.sort();
        ToolOutput::ok(listing(hits, MAX_FILE_RESULTS, "files"))
    }
}

/// Find files by name substring.
pub struct FindFilesTool;

#[async_trait]
impl Tool for FindFilesTool {
    fn name(&self) -> &str {
        "find_files"
    }

    fn description(&self) -> &str {
        "Find files whose name contains the given substring (case-insensitive)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Substring of the file name" }
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(name) = call.args.get("name").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'name'");
        };
        let needle = name.to_lowercase();

        let mut hits = Vec::new();
        for entry in walk(&ctx.workspace_root) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains(&needle)
            {
                hits.push(relative(&ctx.workspace_root, entry.path()));
            }
        }
        hits.sort();
        ToolOutput::ok(listing(hits, MAX_FILE_RESULTS, "files"))
    }
}

/// Regex content search over the workspace tree.
pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search file contents with a regex. Returns 'path:line: text' matches,\n\
         most relevant (earliest) first. Optional 'path' restricts the search\n\
         to a subdirectory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Regex to search for" },
                "path": { "type": "string", "description": "Subdirectory to search (optional)" }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(pattern) = call.args.get("pattern").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'pattern'");
        };
        let re = match Regex::new(pattern) {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(format!("invalid regex: {e}")),
        };

        let root = match call.args.get("path").and_then(Value::as_str) {
            Some(sub) => match sandbox::resolve(&ctx.workspace_root, sub) {
                Ok(p) => p,
                Err(e) => return ToolOutput::err(e),
            },
            None => ctx.workspace_root.clone(),
        };

        let mut hits = Vec::new();
        'files: for entry in walk(&root) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(bytes) = std::fs::read(entry.path()) else {
                continue;
            };
            // Skip binary files.
            if bytes.contains(&0) {
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            let rel = relative(&ctx.workspace_root, entry.path());
            for (lineno, line) in text.lines().enumerate() {
                if re.is_match(line) {
                    hits.push(format!("{rel}:{}: {}", lineno + 1, line.trim_end()));
                    if hits.len() > MAX_MATCH_RESULTS * 2 {
                        break 'files;
                    }
                }
            }
        }
        ToolOutput::ok(listing(hits, MAX_MATCH_RESULTS, "matches"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
