// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Integration tests for the assembled stack using the mock model driver.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use piecode_config::{Config, ModelConfig};
use piecode_core::{CompactOptions, TurnDriver};
use piecode_model::ProviderAdapter;
use piecode_tools::{builtin_registry, ApprovalGate, AutoApprover, TodoStore, ToolDispatcher};

fn mock_core(workspace: &tempfile::TempDir) -> TurnDriver {
    let model_cfg = ModelConfig {
        provider: "mock".into(),
        ..ModelConfig::default()
    };
    let driver = piecode_model::from_config(&model_cfg).unwrap();
    let adapter = ProviderAdapter::new(driver, Duration::from_secs(5));

    let todos = TodoStore::default();
    let (tx, rx) = mpsc::channel(64);
    let registry = builtin_registry(todos.clone(), tx);
    let gate = ApprovalGate::new(Arc::new(AutoApprover), Arc::new(AtomicBool::new(true)));
    let dispatcher = ToolDispatcher::new(registry, gate, 12_000);

    TurnDriver::new(
        adapter,
        dispatcher,
        Arc::new(Config::default()),
        workspace.path().to_path_buf(),
        todos,
        rx,
    )
}

#[tokio::test]
async fn mock_turn_round_trips() {
    let ws = tempfile::tempdir().unwrap();
    let mut core = mock_core(&ws);
    let answer = core.run_turn("hello there").await.unwrap();
    assert!(answer.contains("MOCK"), "mock driver echoes the prompt");
    assert_eq!(core.history().len(), 2, "user + assistant");
}

#[tokio::test]
async fn session_directory_is_created_under_workspace() {
    let ws = tempfile::tempdir().unwrap();
    let mut core = mock_core(&ws);
    core.run_turn("hi").await.unwrap();
    let sessions = ws.path().join(".piecode/sessions");
    assert!(sessions.join(core.session_id()).is_dir());
}

#[tokio::test]
async fn compact_on_short_history_is_noop() {
    let ws = tempfile::tempdir().unwrap();
    let mut core = mock_core(&ws);
    core.run_turn("one").await.unwrap();
    let report = core
        .compact_history(CompactOptions::default())
        .await
        .unwrap();
    assert!(!report.compacted);
    assert_eq!(report.removed_messages, 0);
}

#[tokio::test]
async fn unknown_provider_id_is_an_error() {
    let cfg = ModelConfig {
        provider: "does-not-exist".into(),
        ..ModelConfig::default()
    };
    assert!(piecode_model::from_config(&cfg).is_err());
}
