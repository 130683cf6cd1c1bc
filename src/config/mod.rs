pub mod schema;

pub use schema::{
    AuraConfig, DaemonConfig, JournalConfig, OracleConfig, SandboxConfig, SearchConfig,
};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Config file name inside the aura home directory.
pub const CONFIG_FILE: &str = "aura.toml";

/// Default aura home directory (~/.aura).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".aura"))
        .unwrap_or_else(|| PathBuf::from(".aura"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<AuraConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read aura config file")?;
        let config: AuraConfig =
            toml::from_str(&contents).context("Failed to parse aura config (TOML)")?;
        Ok(config)
    } else {
        Ok(AuraConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AuraConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    crate::vault::write_atomic(path, &contents).context("Failed to write config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join(CONFIG_FILE)).expect("load");
        assert_eq!(cfg, AuraConfig::default());
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "name = \"anamkore\"\n[oracle]\nplanner_model = \"local-7b\"\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.name, "anamkore");
        assert_eq!(cfg.oracle.planner_model, "local-7b");
        assert_eq!(cfg.oracle.timeout_secs, 120);
        assert_eq!(cfg.sandbox, SandboxConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join(CONFIG_FILE);
        let mut cfg = AuraConfig::default();
        cfg.daemon.schedule = "0 0 * * * *".into();
        cfg.accept_proposed_tasks = false;

        save_config(&cfg, &path).expect("save");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let oracle = OracleConfig {
            api_key: "sk-inline".into(),
            api_key_env: "AURA_TEST_KEY_UNSET_FOR_SURE".into(),
            ..OracleConfig::default()
        };
        assert_eq!(oracle.effective_api_key().as_deref(), Some("sk-inline"));

        let empty = OracleConfig {
            api_key: String::new(),
            ..oracle
        };
        assert_eq!(empty.effective_api_key(), None);
    }
}
