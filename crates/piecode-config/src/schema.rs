// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tool_calls() -> u32 {
    6
}

fn default_preserve_recent() -> usize {
    6
}

fn default_result_cap_chars() -> usize {
    12_000
}

fn default_shell_timeout_secs() -> u64 {
    30
}

fn default_shell_timeout_max_secs() -> u64 {
    600
}

fn default_test_command() -> String {
    "cargo test".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier: "openai" (any OpenAI-compatible endpoint with
    /// native tool calls), "cmd" (text-mode local command), or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name forwarded to the provider API.
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Environment variable that holds the API key (read at runtime).
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files.
    pub api_key: Option<String>,
    /// Base URL override.  Useful for local proxies, LiteLLM, or Ollama.
    pub base_url: Option<String>,
    /// Command line for the "cmd" provider.  The prompt is written to the
    /// child's stdin; stdout becomes the completion.
    pub command: Option<String>,
    /// Per-request wall-clock timeout for provider calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature (0.0–2.0).
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model_name(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            command: None,
            timeout_secs: default_timeout_secs(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool-call budget for turns that match no specialised intent.
    /// Per-intent budgets in the policy table override this.
    #[serde(default = "default_max_tool_calls")]
    pub default_max_tool_calls: u32,
    /// Number of most-recent messages preserved verbatim by history
    /// compaction.
    #[serde(default = "default_preserve_recent")]
    pub preserve_recent: usize,
    /// Produce a lightweight plan before the agentic loop.  Also enabled by
    /// setting PIECODE_PLAN=1 in the environment.
    #[serde(default)]
    pub plan_mode: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_max_tool_calls: default_max_tool_calls(),
            preserve_recent: default_preserve_recent(),
            plan_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// When true, "standard" shell commands run without asking.  Commands
    /// classified dangerous always ask regardless of this flag; commands
    /// classified safe never ask.
    #[serde(default)]
    pub auto_approve: bool,
    /// Tool results larger than this are spilled to a file under
    /// `.piecode/shell/` and replaced with a preview plus the saved path.
    #[serde(default = "default_result_cap_chars")]
    pub result_cap_chars: usize,
    /// Default shell command timeout.
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
    /// Upper bound for the per-call shell timeout parameter.
    #[serde(default = "default_shell_timeout_max_secs")]
    pub shell_timeout_max_secs: u64,
    /// Command run by the `run_tests` tool.
    #[serde(default = "default_test_command")]
    pub test_command: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            result_cap_chars: default_result_cap_chars(),
            shell_timeout_secs: default_shell_timeout_secs(),
            shell_timeout_max_secs: default_shell_timeout_max_secs(),
            test_command: default_test_command(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
