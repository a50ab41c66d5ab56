// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::classify::ShellClassification;

/// Literal result returned for a command the user declined.  Wire-stable:
/// the model is expected to read this text and change course.
pub const NOT_APPROVED: &str = "Command was not approved by the user.";

/// Asks the operator whether a shell command may run.
///
/// Implementations suspend the turn until the user answers (terminal
/// prompt, UI dialog).  The decision of *whether* to ask lives in
/// [`ApprovalGate`], not here.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, command: &str, classification: ShellClassification) -> bool;
}

/// Approves everything.  For tests and `--yolo` style wrappers.
pub struct AutoApprover;

#[async_trait]
impl Approver for AutoApprover {
    async fn approve(&self, _command: &str, _classification: ShellClassification) -> bool {
        true
    }
}

/// Denies everything.  Default for non-interactive contexts where nobody
/// can answer a prompt.
pub struct DenyAllApprover;

#[async_trait]
impl Approver for DenyAllApprover {
    async fn approve(&self, _command: &str, _classification: ShellClassification) -> bool {
        false
    }
}

/// Combines the classification, the global auto-approve flag, and the
/// interactive approver into one decision.
///
/// - safe ⇒ run without asking, even when auto-approval is off;
/// - dangerous ⇒ always ask, even when auto-approval is on;
/// - standard ⇒ ask iff auto-approval is off.
pub struct ApprovalGate {
    approver: Arc<dyn Approver>,
    /// Shared so the wrapper can flip it at runtime (e.g. a `/auto` toggle).
    auto_approve: Arc<AtomicBool>,
}

impl ApprovalGate {
    pub fn new(approver: Arc<dyn Approver>, auto_approve: Arc<AtomicBool>) -> Self {
        Self {
            approver,
            auto_approve,
        }
    }

    pub fn auto_approve_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.auto_approve)
    }

    /// Returns `true` when the command may execute.
    pub async fn permit(&self, command: &str, classification: ShellClassification) -> bool {
        match classification {
            ShellClassification::Safe => true,
            ShellClassification::Dangerous => {
                self.approver.approve(command, classification).await
            }
            ShellClassification::Standard => {
                if self.auto_approve.load(Ordering::Relaxed) {
                    true
                } else {
                    self.approver.approve(command, classification).await
                }
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
