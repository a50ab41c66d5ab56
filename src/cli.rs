// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::Parser;

/// piecode — an interactive terminal AI coding assistant.
#[derive(Parser, Debug)]
#[command(name = "piecode", version, about)]
pub struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, short = 'w')]
    pub workspace: Option<PathBuf>,

    /// Path to an explicit config file.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Run one prompt non-interactively and print the answer.
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,

    /// Auto-approve standard shell commands (dangerous ones still ask).
    #[arg(long)]
    pub auto_approve: bool,

    /// Verbose logging to stderr (or set PIECODE_LOG).
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
