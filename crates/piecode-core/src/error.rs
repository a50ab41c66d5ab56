// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use piecode_model::ProviderError;

/// Errors that reach the caller of `run_turn`.
///
/// The surface is deliberately narrow: tool failures, classifier oddities,
/// and loop-guard trips are all recovered inside the turn by emitting a
/// textual result.  What remains is user cancellation, credentials, and
/// unrecoverable transport failures — each with a one-line human message
/// and a stable code.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("task aborted by user")]
    TaskAborted,
    #[error("provider timed out: {0}")]
    ProviderTimeout(String),
    #[error("provider transport failure: {0}")]
    ProviderTransport(String),
    #[error("provider authentication failure: {0}")]
    ProviderAuth(String),
    #[error("provider returned malformed output: {0}")]
    ProviderMalformed(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::TaskAborted => "TASK_ABORTED",
            CoreError::ProviderTimeout(_) => "PROVIDER_TIMEOUT",
            CoreError::ProviderTransport(_) => "PROVIDER_TRANSPORT",
            CoreError::ProviderAuth(_) => "PROVIDER_AUTH",
            CoreError::ProviderMalformed(_) => "PROVIDER_MALFORMED",
            CoreError::PolicyViolation(_) => "POLICY_VIOLATION",
        }
    }
}

impl From<ProviderError> for CoreError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Aborted => CoreError::TaskAborted,
            ProviderError::Timeout(d) => CoreError::ProviderTimeout(format!("{d:?}")),
            ProviderError::Transport(m) => CoreError::ProviderTransport(m),
            ProviderError::AuthMissing(m) => CoreError::ProviderAuth(m),
            ProviderError::Malformed(m) => CoreError::ProviderMalformed(m),
        }
    }
}
