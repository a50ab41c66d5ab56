// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::sandbox;
use crate::tool::{Tool, ToolContext, ToolInvocation, ToolOutput};

/// Replace one exact text occurrence in one file.
///
/// Also registered under the `apply_patch` alias for wire compatibility.
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact text fragment in a file. 'old_text' must match the\n\
         current file content exactly once — include enough surrounding lines\n\
         to make the match unique."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to edit" },
                "old_text": { "type": "string", "description": "Exact text to replace" },
                "new_text": { "type": "string", "description": "Replacement text" }
            },
            "required": ["path", "old_text", "new_text"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(path) = call.args.get("path").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'path'");
        };
        let Some(old_text) = call.args.get("old_text").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'old_text'");
        };
        let Some(new_text) = call.args.get("new_text").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'new_text'");
        };
        if old_text.is_empty() {
            return ToolOutput::err("'old_text' must not be empty");
        }

        let abs = match sandbox::resolve(&ctx.workspace_root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(e),
        };
        let text = match tokio::fs::read_to_string(&abs).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(format!("read error: {e}")),
        };

        let matches = text.matches(old_text).count();
        if matches == 0 {
            return ToolOutput::err(format!(
                "old_text not found in {path}; re-read the file and try again"
            ));
        }
        if matches > 1 {
            return ToolOutput::err(format!(
                "old_text matches {matches} times in {path}; add surrounding \
                 context to make it unique"
            ));
        }

        debug!(path = %abs.display(), "edit_file");
        let updated = text.replacen(old_text, new_text, 1);
        match tokio::fs::write(&abs, updated).await {
            Ok(_) => ToolOutput::ok(format!("edited {path}")),
            Err(e) => ToolOutput::err(format!("write error: {e}")),
        }
    }
}

/// Literal find/replace across an explicit list of files.
pub struct ReplaceInFilesTool;

#[async_trait]
impl Tool for ReplaceInFilesTool {
    fn name(&self) -> &str {
        "replace_in_files"
    }

    fn description(&self) -> &str {
        "Replace every literal occurrence of 'find' with 'replace' in each of\n\
         the listed files. Reports per-file replacement counts."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Files to edit"
                },
                "find": { "type": "string", "description": "Literal text to find" },
                "replace": { "type": "string", "description": "Replacement text" }
            },
            "required": ["paths", "find", "replace"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(paths) = call.args.get("paths").and_then(Value::as_array) else {
            return ToolOutput::err("missing 'paths' array");
        };
        let Some(find) = call.args.get("find").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'find'");
        };
        let Some(replace) = call.args.get("replace").and_then(Value::as_str) else {
            return ToolOutput::err("missing 'replace'");
        };
        if find.is_empty() {
            return ToolOutput::err("'find' must not be empty");
        }

        let mut report = Vec::new();
        let mut total = 0usize;
        for p in paths {
            let Some(path) = p.as_str() else { continue };
            let abs = match sandbox::resolve(&ctx.workspace_root, path) {
                Ok(a) => a,
                Err(e) => return ToolOutput::err(e),
            };
            let text = match tokio::fs::read_to_string(&abs).await {
                Ok(t) => t,
                Err(e) => {
                    report.push(format!("{path}: read error: {e}"));
                    continue;
                }
            };
            let count = text.matches(find).count();
            if count == 0 {
                report.push(format!("{path}: 0 replacements"));
                continue;
            }
            let updated = text.replace(find, replace);
            if let Err(e) = tokio::fs::write(&abs, updated).await {
                report.push(format!("{path}: write error: {e}"));
                continue;
            }
            total += count;
            report.push(format!("{path}: {count} replacements"));
        }

        if report.is_empty() {
            return ToolOutput::err("'paths' is empty");
        }
        ToolOutput::ok(format!(
            "{} total replacements\n{}",
            total,
            report.join("\n")
        ))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ctx(dir: &tempfile::TempDir) -> ToolContext {
        ToolContext::new(dir.path())
    }

    fn call(name: &str, args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new("t", name, args)
    }

    // ── edit_file ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn edit_replaces_unique_match() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("f.rs"), "fn old_name() {}\n").unwrap();
        let r = EditFileTool
            .execute(
                &call(
                    "edit_file",
                    json!({"path": "f.rs", "old_text": "old_name", "new_text": "new_name"}),
                ),
                &ctx(&ws),
            )
            .await;
        assert!(!r.is_error, "{}", r.content);
        let text = std::fs::read_to_string(ws.path().join("f.rs")).unwrap();
        assert_eq!(text, "fn new_name() {}\n");
    }

    #[tokio::test]
    async fn edit_rejects_missing_match() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("f.rs"), "content").unwrap();
        let r = EditFileTool
            .execute(
                &call(
                    "edit_file",
                    json!({"path": "f.rs", "old_text": "absent", "new_text": "x"}),
                ),
                &ctx(&ws),
            )
            .await;
        assert!(r.is_error);
        assert!(r.content.contains("not found"));
    }

    #[tokio::test]
    async fn edit_rejects_ambiguous_match() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("f.rs"), "x = 1; x = 1;").unwrap();
        let r = EditFileTool
            .execute(
                &call(
                    "edit_file",
                    json!({"path": "f.rs", "old_text": "x = 1;", "new_text": "y = 2;"}),
                ),
                &ctx(&ws),
            )
            .await;
        assert!(r.is_error);
        assert!(r.content.contains("2 times"));
        // File must be unchanged.
        let text = std::fs::read_to_string(ws.path().join("f.rs")).unwrap();
        assert_eq!(text, "x = 1; x = 1;");
    }

    #[tokio::test]
    async fn edit_outside_workspace_is_rejected() {
        let ws = tempfile::tempdir().unwrap();
        let r = EditFileTool
            .execute(
                &call(
                    "edit_file",
                    json!({"path": "../f.rs", "old_text": "a", "new_text": "b"}),
                ),
                &ctx(&ws),
            )
            .await;
        assert!(r.is_error);
        assert!(r.content.contains("escapes the workspace"));
    }

    // ── replace_in_files ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn replace_reports_per_file_counts() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("a.txt"), "foo foo").unwrap();
        std::fs::write(ws.path().join("b.txt"), "foo").unwrap();
        let r = ReplaceInFilesTool
            .execute(
                &call(
                    "replace_in_files",
                    json!({"paths": ["a.txt", "b.txt"], "find": "foo", "replace": "bar"}),
                ),
                &ctx(&ws),
            )
            .await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("3 total replacements"));
        assert!(r.content.contains("a.txt: 2 replacements"));
        assert_eq!(
            std::fs::read_to_string(ws.path().join("b.txt")).unwrap(),
            "bar"
        );
    }

    #[tokio::test]
    async fn replace_with_no_matches_reports_zero() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("a.txt"), "nothing here").unwrap();
        let r = ReplaceInFilesTool
            .execute(
                &call(
                    "replace_in_files",
                    json!({"paths": ["a.txt"], "find": "foo", "replace": "bar"}),
                ),
                &ctx(&ws),
            )
            .await;
        assert!(!r.is_error);
        assert!(r.content.contains("0 total replacements"));
    }
}
