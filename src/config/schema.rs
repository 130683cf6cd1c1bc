//! Configuration schema for aura.toml.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    /// Human-readable agent name.
    pub name: String,

    /// Vault holding journal, task queue and identity documents.
    pub vault_path: String,

    /// Agent source tree, readable through the sandbox.
    pub code_path: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Append tasks proposed by the reflector to the queue.
    pub accept_proposed_tasks: bool,

    pub oracle: OracleConfig,
    pub sandbox: SandboxConfig,
    pub journal: JournalConfig,
    pub search: SearchConfig,
    pub daemon: DaemonConfig,
}

/// Reasoning oracle endpoint and models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// OpenAI-compatible API base URL.
    pub api_url: String,

    /// API key; empty means read `api_key_env` at startup.
    pub api_key: String,

    /// Environment variable consulted when `api_key` is empty.
    pub api_key_env: String,

    pub planner_model: String,
    pub synthesizer_model: String,
    pub reflector_model: String,

    /// Maximum tokens per oracle call.
    pub max_tokens: u32,

    pub temperature: f64,

    /// Seconds before an oracle call counts as failed, retries included.
    pub timeout_secs: u64,

    /// Extra attempts after a transient failure (network, 429, 5xx).
    pub transient_retries: u32,
}

/// Sandbox root map and write allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// First path segments that map to the code root.
    pub code_entries: Vec<String>,

    /// Path prefixes `write_file` may touch.
    pub writable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Characters of the last tool result kept in a journal summary.
    pub summary_result_chars: usize,

    /// Lines returned for entries that carry no reflection section.
    pub fallback_summary_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    pub extensions: Vec<String>,
    pub skip_dirs: Vec<String>,
}

/// Background cycle schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Cron expression (with seconds field).
    pub schedule: String,

    /// Failed cycles in a row before the daemon backs off.
    pub max_consecutive_failures: u32,

    /// Pause after hitting `max_consecutive_failures`.
    pub backoff_secs: u64,
}

impl Default for AuraConfig {
    fn default() -> Self {
        Self {
            name: "aura".into(),
            vault_path: "~/.aura/vault".into(),
            code_path: ".".into(),
            log_level: "info".into(),
            accept_proposed_tasks: true,
            oracle: OracleConfig::default(),
            sandbox: SandboxConfig::default(),
            journal: JournalConfig::default(),
            search: SearchConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".into(),
            api_key: String::new(),
            api_key_env: "AURA_API_KEY".into(),
            planner_model: "gpt-4o-mini".into(),
            synthesizer_model: "gpt-4o-mini".into(),
            reflector_model: "gpt-4o-mini".into(),
            max_tokens: 2048,
            temperature: 0.2,
            timeout_secs: 120,
            transient_retries: 1,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            code_entries: vec![
                "src".into(),
                "tests".into(),
                "Cargo.toml".into(),
                "README.md".into(),
                "DESIGN.md".into(),
            ],
            writable: vec!["1-Inbox".into(), "2-Journal".into(), "Knowledge".into()],
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            summary_result_chars: 600,
            fallback_summary_lines: 10,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 200,
            extensions: vec!["rs".into(), "md".into(), "toml".into()],
            skip_dirs: vec![".git".into(), "target".into(), "vault".into()],
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            schedule: "0 */5 * * * *".into(),
            max_consecutive_failures: 3,
            backoff_secs: 300,
        }
    }
}

impl AuraConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).into_owned())
    }

    pub fn resolved_vault_path(&self) -> PathBuf {
        self.resolve_path(&self.vault_path)
    }

    pub fn resolved_code_path(&self) -> PathBuf {
        self.resolve_path(&self.code_path)
    }
}

impl OracleConfig {
    /// The configured key, or the value of `api_key_env`.
    pub fn effective_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}
