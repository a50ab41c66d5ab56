// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::builtin::shell::ShellTool;
use crate::tool::{OutputCategory, Tool, ToolContext, ToolInvocation, ToolOutput};

/// Run the project's configured test command.
///
/// A thin wrapper over the shell tool so test runs share its timeout, kill,
/// and output handling.  The command itself comes from configuration, never
/// from the model.
pub struct RunTestsTool;

#[async_trait]
impl Tool for RunTestsTool {
    fn name(&self) -> &str {
        "run_tests"
    }

    fn description(&self) -> &str {
        "Run the project's test suite using the configured test command.\n\
         Optional 'filter' is appended to the command to run a subset."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filter": {
                    "type": "string",
                    "description": "Test name filter appended to the test command (optional)"
                }
            },
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let mut command = ctx.test_command.clone();
        if let Some(filter) = call.args.get("filter").and_then(Value::as_str) {
            // The filter is a single argument; quote it against word splitting.
            command.push_str(&format!(" '{}'", filter.replace('\'', "'\\''")));
        }
        debug!(cmd = %command, "run_tests");

        let shell_call = ToolInvocation::new(
            call.id.clone(),
            "shell",
            json!({
                "command": command,
                "timeout": ctx.shell_timeout_max_secs,
            }),
        );
        ShellTool.execute(&shell_call, ctx).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ctx_with_cmd(dir: &tempfile::TempDir, cmd: &str) -> ToolContext {
        let mut ctx = ToolContext::new(dir.path());
        ctx.test_command = cmd.to_string();
        ctx
    }

    #[tokio::test]
    async fn runs_configured_command() {
        let ws = tempfile::tempdir().unwrap();
        let ctx = ctx_with_cmd(&ws, "echo tests passed");
        let r = RunTestsTool
            .execute(&ToolInvocation::new("t", "run_tests", json!({})), &ctx)
            .await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("tests passed"));
        assert!(r.content.starts_with("exit_code: 0"));
    }

    #[tokio::test]
    async fn filter_is_appended_quoted() {
        let ws = tempfile::tempdir().unwrap();
        let ctx = ctx_with_cmd(&ws, "echo running");
        let r = RunTestsTool
            .execute(
                &ToolInvocation::new("t", "run_tests", json!({"filter": "my_test"})),
                &ctx,
            )
            .await;
        assert!(r.content.contains("running my_test"));
    }

    #[tokio::test]
    async fn failing_suite_is_error_with_exit_code() {
        let ws = tempfile::tempdir().unwrap();
        let ctx = ctx_with_cmd(&ws, "exit 1");
        let r = RunTestsTool
            .execute(&ToolInvocation::new("t", "run_tests", json!({})), &ctx)
            .await;
        assert!(r.is_error);
        assert!(r.content.starts_with("exit_code: 1"));
    }
}
