// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-session trajectory persistence.
//!
//! Each turn appends one JSON object to
//! `.piecode/sessions/<session-id>/trajectory.jsonl`, and notable lines go
//! to a human-readable `logs.log` beside it.  Files are append-only and
//! never deleted by the core.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// One persisted turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub id: String,
    /// Intent name of the turn.
    pub kind: String,
    pub input: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// "ok", "aborted", or an error code.
    pub status: String,
    /// Serialised core events observed during the turn.
    pub events: Vec<serde_json::Value>,
    pub logs: Vec<String>,
}

/// Append-only writer for one session's trajectory.
#[derive(Debug, Clone)]
pub struct Trajectory {
    dir: PathBuf,
}

impl Trajectory {
    /// Create the session directory under the workspace.
    pub fn new(workspace_root: &Path, session_id: &str) -> std::io::Result<Self> {
        let dir = workspace_root
            .join(".piecode")
            .join("sessions")
            .join(session_id);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one turn record to `trajectory.jsonl`.  Persistence failures
    /// are logged and swallowed; observability must not fail a turn.
    pub fn record_turn(&self, record: &TurnRecord) {
        let line = match serde_json::to_string(record) {
            Ok(l) => l,
            Err(e) => {
                warn!("cannot serialise turn record: {e}");
                return;
            }
        };
        if let Err(e) = append_line(&self.dir.join("trajectory.jsonl"), &line) {
            warn!("cannot write trajectory: {e}");
        }
        for log in &record.logs {
            self.log_line(log);
        }
    }

    /// Append one human-readable line to `logs.log`.
    pub fn log_line(&self, line: &str) {
        let stamped = format!("{} {line}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"));
        if let Err(e) = append_line(&self.dir.join("logs.log"), &stamped) {
            warn!("cannot write log line: {e}");
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{line}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
