// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod adapter;
mod cmd;
mod driver;
mod error;
mod mock;
mod openai_compat;
mod types;

pub use adapter::ProviderAdapter;
pub use cmd::CmdDriver;
pub use driver::{ModelDriver, ResponseStream};
pub use error::ProviderError;
pub use mock::{MockDriver, ScriptedDriver};
pub use openai_compat::OpenAiCompatDriver;
pub use types::*;

use std::sync::Arc;

use piecode_config::ModelConfig;

/// Resolve the API key from explicit config or the configured env var.
fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    cfg.api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
}

/// Construct a driver from configuration.
///
/// Recognised provider ids: "openai" (any OpenAI-compatible endpoint),
/// "cmd" (text-mode local command), "mock".
pub fn from_config(cfg: &ModelConfig) -> Result<Arc<dyn ModelDriver>, ProviderError> {
    match cfg.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatDriver::new(
            cfg.name.clone(),
            resolve_api_key(cfg),
            cfg.base_url.clone(),
            cfg.temperature,
        ))),
        "cmd" => {
            let command = cfg.command.clone().ok_or_else(|| {
                ProviderError::Transport(
                    "provider 'cmd' requires model.command in the config".into(),
                )
            })?;
            Ok(Arc::new(CmdDriver::new(command)))
        }
        "mock" => Ok(Arc::new(MockDriver)),
        other => Err(ProviderError::Transport(format!(
            "unknown provider '{other}'; expected openai, cmd, or mock"
        ))),
    }
}
