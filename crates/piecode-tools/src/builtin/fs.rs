// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::sandbox;
use crate::tool::{OutputCategory, Tool, ToolContext, ToolInvocation, ToolOutput};

const READ_LIMIT_BYTES: usize = 200_000;

fn require_path<'a>(call: &'a ToolInvocation) -> Result<&'a str, ToolOutput> {
    call.args
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolOutput::err("missing 'path'"))
}

/// Read one file, optionally a line window of it.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the workspace. Optional 'offset' (1-based line) and\n\
         'limit' (line count) select a window of a large file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path, relative to the workspace root" },
                "offset": { "type": "integer", "description": "1-based first line to read (optional)" },
                "limit": { "type": "integer", "description": "Number of lines to read (optional)" }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let path = match require_path(call) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let abs = match sandbox::resolve(&ctx.workspace_root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(e),
        };
        debug!(path = %abs.display(), "read_file");

        let bytes = match tokio::fs::read(&abs).await {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(format!("read error: {e}")),
        };
        let text = String::from_utf8_lossy(&bytes);

        let offset = call.args.get("offset").and_then(Value::as_u64);
        let limit = call.args.get("limit").and_then(Value::as_u64);
        let content = match (offset, limit) {
            (None, None) => text.to_string(),
            (offset, limit) => {
                let skip = offset.unwrap_or(1).saturating_sub(1) as usize;
                let take = limit.unwrap_or(u64::MAX) as usize;
                text.lines()
                    .skip(skip)
                    .take(take)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        if content.len() > READ_LIMIT_BYTES {
            let mut cut = READ_LIMIT_BYTES;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            return ToolOutput::ok(format!(
                "{}...[truncated; use offset/limit to read more]",
                &content[..cut]
            ));
        }
        ToolOutput::ok(content)
    }
}

/// Read several files in one call.
pub struct ReadFilesTool;

#[async_trait]
impl Tool for ReadFilesTool {
    fn name(&self) -> &str {
        "read_files"
    }

    fn description(&self) -> &str {
        "Read multiple files at once. 'paths' is a list of workspace-relative paths."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Files to read"
                }
            },
            "required": ["paths"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let Some(paths) = call.args.get("paths").and_then(Value::as_array) else {
            return ToolOutput::err("missing 'paths' array");
        };
        if paths.is_empty() {
            return ToolOutput::err("'paths' is empty");
        }

        let mut sections = Vec::new();
        for p in paths {
            let Some(path) = p.as_str() else { continue };
            let abs = match sandbox::resolve(&ctx.workspace_root, path) {
                Ok(a) => a,
                Err(e) => return ToolOutput::err(e),
            };
            match tokio::fs::read(&abs).await {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    sections.push(format!("=== {path} ===\n{text}"));
                }
                Err(e) => sections.push(format!("=== {path} ===\n[read error: {e}]")),
            }
        }
        ToolOutput::ok(sections.join("\n\n"))
    }
}

/// Write (create or overwrite) one file, creating parent directories.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write 'content' to 'path' (workspace-relative), creating parent\n\
         directories as needed. Overwrites an existing file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path to write" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let path = match require_path(call) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let Some(content) = call.args.get("content").and_then(Value::as_str) else {
            return ToolOutput::err(
                "write_file requires a 'content' field but it is missing. This \
                 usually means the arguments were truncated; retry with smaller content.",
            );
        };
        let abs = match sandbox::resolve(&ctx.workspace_root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(e),
        };
        debug!(path = %abs.display(), bytes = content.len(), "write_file");

        if let Some(parent) = abs.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(format!("mkdir error: {e}"));
            }
        }
        match tokio::fs::write(&abs, content).await {
            Ok(_) => ToolOutput::ok(format!("wrote {} bytes to {path}", content.len())),
            Err(e) => ToolOutput::err(format!("write error: {e}")),
        }
    }
}

/// List one directory level.
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory (default: the workspace root).\n\
         Directories are suffixed with '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list (optional)" }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolOutput {
        let path = call.args.get("path").and_then(Value::as_str).unwrap_or(".");
        let abs = match sandbox::resolve(&ctx.workspace_root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(e),
        };
        match tokio::fs::read_dir(&abs).await {
            Ok(mut rd) => {
                let mut entries = Vec::new();
                while let Ok(Some(entry)) = rd.next_entry().await {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|t| t.is_dir())
                        .unwrap_or(false);
                    entries.push(if is_dir { format!("{name}/") } else { name });
                }
                entries.sort();
                ToolOutput::ok(entries.join("\n"))
            }
            Err(e) => ToolOutput::err(format!("list error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
