// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Cli;
use piecode_core::{CompactOptions, CoreEvent, TurnDriver};
use piecode_model::ProviderAdapter;
use piecode_tools::{
    builtin_registry, ApprovalGate, Approver, ShellClassification, TodoStore, ToolDispatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let workspace = match &cli.workspace {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("workspace {} not accessible", workspace.display()))?;

    let config = Arc::new(piecode_config::load(&workspace, cli.config.as_deref())?);
    let driver = piecode_model::from_config(&config.model)
        .map_err(|e| anyhow::anyhow!("provider setup failed: {e}"))?;
    let adapter = ProviderAdapter::new(driver, Duration::from_secs(config.model.timeout_secs));

    let todos = TodoStore::default();
    let (tool_event_tx, tool_event_rx) = mpsc::channel(64);
    let registry = builtin_registry(todos.clone(), tool_event_tx);
    let auto = Arc::new(AtomicBool::new(
        cli.auto_approve || config.tools.auto_approve,
    ));
    let gate = ApprovalGate::new(Arc::new(TerminalApprover), Arc::clone(&auto));
    let dispatcher = ToolDispatcher::new(registry, gate, config.tools.result_cap_chars);

    let mut core = TurnDriver::new(
        adapter,
        dispatcher,
        Arc::clone(&config),
        workspace.clone(),
        todos,
        tool_event_rx,
    )
    .with_project_instructions(read_project_instructions(&workspace))
    .with_observer(Box::new(print_event));

    // Ctrl-C aborts the turn in flight instead of killing the process.
    let abort = core.abort_handle();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if !abort.request_abort() {
                eprintln!("(no turn active; Ctrl-D to exit)");
            }
        }
    });

    if let Some(prompt) = &cli.prompt {
        let answer = core
            .run_turn(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {e}", e.code()))?;
        println!("{answer}");
        return Ok(());
    }

    repl(&mut core, &auto).await
}

/// Interactive loop: one line in, one turn out.
async fn repl(core: &mut TurnDriver, auto: &Arc<AtomicBool>) -> anyhow::Result<()> {
    eprintln!(
        "piecode session {} — /clear, /compact, /auto, Ctrl-D to exit",
        core.session_id()
    );
    let stdin = std::io::stdin();
    loop {
        eprint!("> ");
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/clear" => {
                core.clear_history().await;
                eprintln!("history cleared");
            }
            "/compact" => match core.compact_history(CompactOptions::default()).await {
                Ok(report) => eprintln!(
                    "compacted: {} → {} messages",
                    report.before_messages, report.after_messages
                ),
                Err(e) => eprintln!("compaction failed: {e}"),
            },
            "/auto" => {
                let new = !auto.load(Ordering::Relaxed);
                auto.store(new, Ordering::Relaxed);
                eprintln!("auto-approve {}", if new { "on" } else { "off" });
            }
            input => match core.run_turn(input).await {
                Ok(answer) => println!("\n{answer}"),
                Err(e) => eprintln!("[{}] {e}", e.code()),
            },
        }
    }
}

/// Terminal approver: prints the command and reads y/N from stdin.
struct TerminalApprover;

#[async_trait::async_trait]
impl Approver for TerminalApprover {
    async fn approve(&self, command: &str, classification: ShellClassification) -> bool {
        let cmd = command.to_string();
        // Blocking prompt on a worker thread; the turn is suspended on this
        // approval anyway.
        tokio::task::spawn_blocking(move || {
            eprint!("run {classification:?} command `{cmd}`? [y/N] ");
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_err() {
                return false;
            }
            matches!(line.trim(), "y" | "Y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}

/// Minimal event rendering for the terminal.
fn print_event(event: &CoreEvent) {
    match event {
        CoreEvent::LlmResponseDelta { text } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        CoreEvent::ToolStart { tool, .. } => eprintln!("[tool] {tool} ..."),
        CoreEvent::ToolEnd { tool, is_error, .. } => {
            eprintln!("[tool] {tool} {}", if *is_error { "failed" } else { "ok" });
        }
        CoreEvent::Plan { text } => eprintln!("[plan]\n{text}"),
        _ => {}
    }
}

fn read_project_instructions(workspace: &std::path::Path) -> Option<String> {
    for name in [".piecode/instructions.md", "AGENTS.md"] {
        if let Ok(text) = std::fs::read_to_string(workspace.join(name)) {
            return Some(text);
        }
    }
    None
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PIECODE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
