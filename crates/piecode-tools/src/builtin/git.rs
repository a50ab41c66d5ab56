// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::tool::{OutputCategory, Tool, ToolContext, ToolInvocation, ToolOutput};

/// Run a read-only git subcommand in the workspace and collect its output.
async fn run_git(ctx: &ToolContext, args: &[&str]) -> ToolOutput {
    let result = Command::new("git")
        .args(args)
        .current_dir(&ctx.workspace_root)
        .kill_on_drop(true)
        .output()
        .await;

    match result {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if output.status.success() {
                let text = if stdout.trim().is_empty() {
                    "(no output)".to_string()
                } else {
                    stdout.to_string()
                };
                ToolOutput::ok(text)
            } else {
                ToolOutput::err(format!(
                    "git {} failed: {}",
                    args.join(" "),
                    stderr.trim()
                ))
            }
        }
        Err(e) => ToolOutput::err(format!("cannot run git: {e}")),
    }
}

/// Working-tree status.
pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show the git working-tree status of the workspace."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, _call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        run_git(ctx, &["status"]).await
    }
}

/// Unstaged (or staged, on request) diff.
pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show the git diff of the workspace. Set 'staged' for the index diff;\n\
         'paths' restricts the diff to the given files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "staged": { "type": "boolean", "description": "Diff the index instead of the working tree" },
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Limit the diff to these paths"
                }
            },
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let mut args: Vec<String> = vec!["diff".into()];
        if call
            .args
            .get("staged")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            args.push("--staged".into());
        }
        if let Some(paths) = call.args.get("paths").and_then(Value::as_array) {
            args.push("--".into());
            for p in paths {
                if let Some(s) = p.as_str() {
                    args.push(s.to_string());
                }
            }
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_git(ctx, &arg_refs).await
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

    async fn git(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .await
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    async fn init_repo() -> tempfile::TempDir {
        let ws = tempfile::tempdir().unwrap();
        git(ws.path(), &["init", "-q"]).await;
        git(ws.path(), &["config", "user.email", "t@example.com"]).await;
        git(ws.path(), &["config", "user.name", "t"]).await;
        ws
    }

    #[tokio::test]
    async fn status_reports_untracked_file() {
        let ws = init_repo().await;
        std::fs::write(ws.path().join("new.txt"), "x").unwrap();
        let r = GitStatusTool
            .execute(&ToolInvocation::new("t", "git_status", json!({})), &ctx(&ws))
            .await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("new.txt"));
    }

    #[tokio::test]
    async fn diff_shows_modification() {
        let ws = init_repo().await;
        std::fs::write(ws.path().join("f.txt"), "one\n").unwrap();
        git(ws.path(), &["add", "."]).await;
        git(ws.path(), &["commit", "-q", "-m", "init"]).await;
        std::fs::write(ws.path().join("f.txt"), "two\n").unwrap();
        let r = GitDiffTool
            .execute(&ToolInvocation::new("t", "git_diff", json!({})), &ctx(&ws))
            .await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("-one"));
        assert!(r.content.contains("+two"));
    }

    #[tokio::test]
    async fn diff_with_no_changes_says_no_output() {
        let ws = init_repo().await;
        std::fs::write(ws.path().join("f.txt"), "one\n").unwrap();
        git(ws.path(), &["add", "."]).await;
        git(ws.path(), &["commit", "-q", "-m", "init"]).await;
        let r = GitDiffTool
            .execute(&ToolInvocation::new("t", "git_diff", json!({})), &ctx(&ws))
            .await;
        assert!(r.content.contains("(no output)"));
    }

    #[tokio::test]
    async fn status_outside_a_repo_is_error() {
        let ws = tempfile::tempdir().unwrap();
        let r = GitStatusTool
            .execute(&ToolInvocation::new("t", "git_status", json!({})), &ctx(&ws))
            .await;
        assert!(r.is_error);
    }
}
