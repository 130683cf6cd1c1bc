//! First-run interactive setup wizard.
//!
//! Steps:
//! 1. Display banner
//! 2. Collect agent name
//! 3. Collect oracle endpoint, key and model
//! 4. Collect vault and code paths
//! 5. Write aura.toml and initialise the vault

use crate::config::{self, AuraConfig, CONFIG_FILE};
use crate::vault::init::initialize_vault;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// ASCII banner displayed during setup.
const BANNER: &str = r#"
     _
    / \  _   _ _ __ __ _
   / _ \| | | | '__/ _` |
  / ___ \ |_| | | | (_| |
 /_/   \_\__,_|_|  \__,_|

   Autonomous Cognitive Cycle Runtime
"#;

/// Run the interactive setup wizard on stdin/stdout.
pub fn run_setup_wizard(home_dir: &Path) -> Result<AuraConfig> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut out = io::stdout();
    run_wizard(home_dir, &mut reader, &mut out)
}

/// The wizard over arbitrary input and output.
pub fn run_wizard(
    home_dir: &Path,
    reader: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<AuraConfig> {
    let defaults = AuraConfig::default();
    writeln!(out, "{}", BANNER)?;
    writeln!(out, "Welcome to aura setup.\n")?;

    writeln!(out, "[1/4] Identity")?;
    let name = prompt_with_default(reader, out, "  Agent name", &defaults.name)?;

    writeln!(out, "\n[2/4] Oracle")?;
    let api_url = prompt_with_default(
        reader,
        out,
        "  OpenAI-compatible API URL",
        &defaults.oracle.api_url,
    )?;
    let api_key = prompt(
        reader,
        out,
        &format!(
            "  API key (or press Enter to use ${})",
            defaults.oracle.api_key_env
        ),
    )?;
    let model = prompt_with_default(reader, out, "  Model", &defaults.oracle.planner_model)?;

    writeln!(out, "\n[3/4] Paths")?;
    let default_vault = home_dir.join("vault").to_string_lossy().into_owned();
    let vault_path = prompt_with_default(reader, out, "  Vault path", &default_vault)?;
    let code_path = prompt_with_default(reader, out, "  Code path", &defaults.code_path)?;

    writeln!(out, "\n[4/4] Writing configuration...")?;
    std::fs::create_dir_all(home_dir)
        .with_context(|| format!("Failed to create {}", home_dir.display()))?;

    let mut config = AuraConfig {
        name,
        vault_path,
        code_path,
        ..defaults
    };
    config.oracle.api_url = api_url;
    config.oracle.api_key = api_key;
    config.oracle.planner_model = model.clone();
    config.oracle.synthesizer_model = model.clone();
    config.oracle.reflector_model = model;

    config::save_config(&config, &home_dir.join(CONFIG_FILE))?;
    writeln!(out, "  Written: {}", CONFIG_FILE)?;

    let report = initialize_vault(&config.resolved_vault_path())?;
    for created in &report.created {
        writeln!(out, "  Created: {}", created)?;
    }

    writeln!(out, "\nSetup complete! Run `aura run` to start.\n")?;
    Ok(config)
}

/// Prompt the user for input with a label.
fn prompt(reader: &mut impl BufRead, out: &mut impl Write, label: &str) -> Result<String> {
    write!(out, "{}: ", label)?;
    out.flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt with a default value.
fn prompt_with_default(
    reader: &mut impl BufRead,
    out: &mut impl Write,
    label: &str,
    default: &str,
) -> Result<String> {
    write!(out, "{} [{}]: ", label, default)?;
    out.flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}
