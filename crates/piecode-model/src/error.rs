// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

/// Errors surfaced by the provider adapter.
///
/// Anything the upstream transport reports that does not map onto a more
/// specific kind is wrapped as `Transport` with the upstream message.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The call was cancelled through the turn's abort handle.
    #[error("provider call aborted")]
    Aborted,
    /// The per-request wall-clock timeout elapsed.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    /// Network / HTTP / subprocess failure.
    #[error("provider transport error: {0}")]
    Transport(String),
    /// No usable credentials for the configured provider.
    #[error("provider credentials missing: {0}")]
    AuthMissing(String),
    /// The provider returned a body the adapter could not interpret.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transport errors are retried once per loop iteration; everything
    /// else is fatal to the turn.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}
