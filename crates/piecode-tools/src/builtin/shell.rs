// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(unix)]
use libc;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::tool::{OutputCategory, Tool, ToolContext, ToolInvocation, ToolOutput};

/// How much of the collected output survives an abort or timeout.
const KILLED_TAIL_CHARS: usize = 2_000;

/// Grace period between SIGTERM and SIGKILL when tearing a child down.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Built-in tool that runs a shell command inside the workspace.
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return its output.\n\
         'command' is required and can be any bash one-liner.\n\
         The first line of the result is always `exit_code: N`.\n\
         Optional 'timeout' in seconds (default 30, max 600); a command that\n\
         exceeds it is killed and reported with exit_code: -1.\n\
         Prefer non-interactive commands; avoid anything that needs a TTY.\n\
         Use the dedicated file tools (read_file, edit_file, search_files)\n\
         instead of cat/sed/grep where possible."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash one-liner to execute."
                },
                "timeout": {
                    "type": "integer",
                    "description": "Execution timeout in seconds (optional)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(Value::as_str) else {
            return ToolOutput::err(
                "Please provide the shell command to execute as the 'command' parameter.",
            );
        };
        let timeout_secs = call
            .args
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(ctx.shell_timeout_secs)
            .min(ctx.shell_timeout_max_secs);

        debug!(cmd = %command, timeout_secs, "executing shell tool");

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command);
        cmd.current_dir(&ctx.workspace_root);
        // Detach the child from the controlling terminal: stdin from
        // /dev/null defeats isatty probes, and setsid() stops the child from
        // reopening /dev/tty and corrupting the caller's terminal state.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(format!("spawn error: {e}")),
        };
        let pid = child.id();
        let wait = child.wait_with_output();
        tokio::pin!(wait);

        // The select must not hold a borrow of `wait` into its handlers, so
        // it only reports what happened; teardown runs afterwards.
        enum Waited {
            Cancelled,
            TimedOut,
            Finished(std::io::Result<Output>),
        }
        let waited = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Waited::Cancelled,
            res = tokio::time::timeout(Duration::from_secs(timeout_secs), &mut wait) => {
                match res {
                    Ok(inner) => Waited::Finished(inner),
                    Err(_) => Waited::TimedOut,
                }
            }
        };

        match waited {
            Waited::Finished(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                let content = format!("exit_code: {code}\n{}", combine_streams(&output));
                if code == 0 {
                    ToolOutput::ok(content)
                } else {
                    ToolOutput::err(content)
                }
            }
            Waited::Finished(Err(e)) => ToolOutput::err(format!("wait error: {e}")),
            Waited::Cancelled => {
                let out = terminate(pid, &mut wait).await;
                killed_output(out, "[aborted]")
            }
            Waited::TimedOut => {
                let out = terminate(pid, &mut wait).await;
                killed_output(out, &format!("[timed out after {timeout_secs}s]"))
            }
        }
    }
}

/// Kill the child's process group: SIGTERM first, SIGKILL after the grace
/// period, then reap whatever output was collected.
async fn terminate<F>(pid: Option<u32>, wait: &mut F) -> Option<Output>
where
    F: Future<Output = std::io::Result<Output>> + Unpin,
{
    send_signal(pid, Signal::Term);
    match tokio::time::timeout(KILL_GRACE, &mut *wait).await {
        Ok(res) => res.ok(),
        Err(_) => {
            send_signal(pid, Signal::Kill);
            tokio::time::timeout(Duration::from_secs(1), wait)
                .await
                .ok()
                .and_then(Result::ok)
        }
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: Option<u32>, sig: Signal) {
    let Some(pid) = pid else { return };
    let sig = match sig {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // Negative pid targets the whole process group created by setsid().
    unsafe {
        libc::kill(-(pid as i32), sig);
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: Option<u32>, _sig: Signal) {
    // kill_on_drop covers non-unix platforms.
}

fn killed_output(out: Option<Output>, marker: &str) -> ToolOutput {
    let tail = out
        .map(|o| tail_chars(&combine_streams(&o), KILLED_TAIL_CHARS))
        .unwrap_or_default();
    let content = if tail.is_empty() {
        format!("exit_code: -1\n{marker}")
    } else {
        format!("exit_code: -1\n{marker}\n{tail}")
    };
    ToolOutput::err(content)
}

fn combine_streams(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut content = String::new();
    if !stdout.is_empty() {
        content.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str("[stderr]\n");
        content.push_str(&stderr);
    }
    content
}

fn tail_chars(s: &str, n: usize) -> String {
    if s.len() <= n {
        return s.to_string();
    }
    let mut start = s.len() - n;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
