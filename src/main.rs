//! Aura: autonomous cognitive-cycle agent runtime.
//!
//! Usage:
//!   aura init               Run the setup wizard and create the vault
//!   aura run                Interactive loop, one cycle per input line
//!   aura cycle [COMMAND]    Run a single cycle
//!   aura daemon             Run background cycles on the cron schedule
//!   aura status             Show the latest journal summary and task queue

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aura::agent::{CycleReport, CycleRequest, Orchestrator};
use aura::config::{self, AuraConfig, CONFIG_FILE};
use aura::heartbeat::HeartbeatDaemon;
use aura::sandbox::Sandbox;
use aura::types::CycleStatus;
use aura::vault::init::initialize_vault;
use aura::vault::journal::NO_ENTRIES;
use aura::vault::Vault;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "aura")]
#[command(version)]
#[command(about = "Autonomous agent running bounded cognitive cycles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the aura home directory (defaults to ~/.aura).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error); defaults to the config's `log_level`.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the config and vault.
    Init {
        /// Write default config without prompting.
        #[arg(long)]
        defaults: bool,
    },

    /// Interactive loop: one cycle per line, empty line for a background cycle.
    Run,

    /// Run one cycle, optionally answering a command.
    Cycle {
        /// Command text; omit for a background cycle.
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Run background cycles on the configured cron schedule.
    Daemon,

    /// Show the agent's current status.
    Status,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve home directory
    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };

    // Initialize logging
    let log_level = resolve_log_level(cli.log_level.as_deref(), &home_dir);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { defaults } => cmd_init(&home_dir, defaults),
        Commands::Run => cmd_run(&home_dir).await,
        Commands::Cycle { command } => cmd_cycle(&home_dir, command.join(" ")).await,
        Commands::Daemon => cmd_daemon(&home_dir).await,
        Commands::Status => cmd_status(&home_dir),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(home_dir: &Path, defaults: bool) -> Result<()> {
    let config_path = home_dir.join(CONFIG_FILE);
    if config_path.exists() {
        let cfg = config::load_config(&config_path)?;
        let report = initialize_vault(&cfg.resolved_vault_path())?;
        println!(
            "{} Config already present; vault checked ({} items created).",
            ">>>".green().bold(),
            report.created.len()
        );
        return Ok(());
    }

    if defaults {
        let cfg = AuraConfig {
            vault_path: home_dir.join("vault").to_string_lossy().into_owned(),
            ..AuraConfig::default()
        };
        config::save_config(&cfg, &config_path)?;
        initialize_vault(&cfg.resolved_vault_path())?;
        println!("{} Wrote {}", ">>>".green().bold(), config_path.display());
        return Ok(());
    }

    aura::setup::run_setup_wizard(home_dir)?;
    Ok(())
}

async fn cmd_run(home_dir: &Path) -> Result<()> {
    let cfg = bootstrap(home_dir)?;
    let name = cfg.name.clone();
    let orchestrator = Arc::new(Orchestrator::from_config(cfg)?);

    println!(
        "{} Starting '{}'. Empty line runs a background cycle, `<tool> {{json}}` calls a tool, `exit` quits.",
        ">>>".green().bold(),
        name
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut cycle: u64 = 1;
    loop {
        print!("{} ", format!("[Cycle {}] >>>", cycle).cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = next_input(&mut lines, interrupted()).await? else {
            break;
        };
        if line.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let request = CycleRequest::from_input(&line, orchestrator.registry());
        let report = run_interruptible(&orchestrator, request).await;
        print_report(&report);
        cycle += 1;
    }

    println!("{} Goodbye.", "<<<".red().bold());
    Ok(())
}

async fn cmd_cycle(home_dir: &Path, command: String) -> Result<()> {
    let cfg = bootstrap(home_dir)?;
    let orchestrator = Arc::new(Orchestrator::from_config(cfg)?);

    let request = CycleRequest::from_input(&command, orchestrator.registry());
    let report = run_interruptible(&orchestrator, request).await;
    print_report(&report);
    Ok(())
}

async fn cmd_daemon(home_dir: &Path) -> Result<()> {
    let cfg = bootstrap(home_dir)?;
    let daemon_config = cfg.daemon.clone();
    let name = cfg.name.clone();
    let orchestrator = Arc::new(Orchestrator::from_config(cfg)?);
    let mut daemon = HeartbeatDaemon::new(orchestrator, &daemon_config)?;

    println!(
        "{} Starting daemon for '{}' ({})",
        ">>>".green().bold(),
        name,
        daemon_config.schedule
    );

    // Create a cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    let daemon_cancel = cancel.clone();
    let handle = tokio::spawn(async move { daemon.run(daemon_cancel).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    println!("\n{} Shutting down gracefully...", "<<<".red().bold());
    cancel.cancel();

    // Wait for the daemon to finish (with a timeout to avoid hanging forever)
    let shutdown_timeout = tokio::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, handle).await {
        Ok(Ok(Err(e))) => warn!("Daemon error: {:#}", e),
        Ok(Err(e)) => warn!("Daemon task join error: {}", e),
        Err(_) => warn!("Daemon did not stop within {:?}", shutdown_timeout),
        Ok(Ok(Ok(()))) => {}
    }

    info!("Daemon shutdown complete");
    Ok(())
}

fn cmd_status(home_dir: &Path) -> Result<()> {
    let cfg = bootstrap(home_dir)?;
    let sandbox = Arc::new(Sandbox::from_config(&cfg)?);
    let vault = Vault::new(sandbox, &cfg.journal);

    let entries = vault.journal().entries()?;
    let summary = vault.journal().latest(false)?;
    let current = vault.current_task()?;
    let tasks = vault.tasks().read()?;

    println!();
    println!("{}", "=== Aura Status ===".bold());
    println!();
    println!("  {}:  {}", "Name".bold(), cfg.name);
    println!("  {}:  {}", "Vault".bold(), cfg.resolved_vault_path().display());
    println!("  {}:  {}", "Code".bold(), cfg.resolved_code_path().display());
    println!("  {}:  {}", "Model".bold(), cfg.oracle.planner_model);
    println!("  {}:  {}", "Journal entries".bold(), entries.len());
    println!();
    println!("  {}:", "Last Cycle".bold());
    for line in summary.as_deref().unwrap_or(NO_ENTRIES).lines() {
        println!("    {}", line);
    }
    println!();
    println!(
        "  {}:  {}",
        "Current Task".bold(),
        if current.is_empty() { "None".dimmed().to_string() } else { current }
    );
    println!();
    println!("  {}:", "Task Queue".bold());
    if tasks.is_empty() {
        println!("    {}", "(empty)".dimmed());
    }
    for task in &tasks {
        let line = task.to_string();
        if task.is_done() {
            println!("    {}", line.dimmed());
        } else {
            println!("    {}", line);
        }
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The `--log-level` flag, else the configured level, else `info`.
fn resolve_log_level(flag: Option<&str>, home_dir: &Path) -> String {
    if let Some(level) = flag {
        return level.to_string();
    }
    let config_path = home_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return "info".to_string();
    }
    match config::load_config(&config_path) {
        Ok(cfg) => cfg.log_level,
        // Logging is not up yet; `bootstrap` reports the bad file properly.
        Err(_) => "info".to_string(),
    }
}

/// Load config from the home directory, or explain how to create it.
fn bootstrap(home_dir: &Path) -> Result<AuraConfig> {
    let config_path = home_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        eprintln!(
            "{} No config found at {:?}. Run `aura init` first.",
            "Error:".red().bold(),
            config_path
        );
        std::process::exit(1);
    }

    config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

/// Next input line; `None` on EOF or once `interrupt` fires.
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt => {
            println!();
            Ok(None)
        }
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run a cycle that Ctrl+C aborts.
async fn run_interruptible(
    orchestrator: &Arc<Orchestrator>,
    request: CycleRequest,
) -> CycleReport {
    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());
    let report = orchestrator.run_cycle(request, &cancel).await;
    watcher.abort();
    report
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; aborting the current cycle");
            cancel.cancel();
        }
    })
}

fn print_report(report: &CycleReport) {
    if let Some(answer) = &report.final_answer {
        println!();
        println!("{}", answer);
        println!();
    }

    let value = report
        .reflection
        .as_ref()
        .map(|r| format!(" | value {}/5 ({})", r.value_score, r.value_type))
        .unwrap_or_default();
    let entry = report
        .entry_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "not journaled".into());
    println!(
        "{} {}{} | {}",
        "---".dimmed(),
        colorize_status(report.status),
        value,
        entry.dimmed()
    );
}

fn colorize_status(status: CycleStatus) -> String {
    let text = status.to_string();
    match status {
        CycleStatus::Success => text.green().to_string(),
        CycleStatus::ToolError => text.yellow().to_string(),
        CycleStatus::PlannerMalfunction | CycleStatus::OracleFailure => text.red().to_string(),
        CycleStatus::CriticalFailure => text.red().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_falls_back_to_config_then_info() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(resolve_log_level(None, temp.path()), "info");

        let cfg = AuraConfig {
            log_level: "debug".into(),
            ..AuraConfig::default()
        };
        config::save_config(&cfg, &temp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(resolve_log_level(None, temp.path()), "debug");
        assert_eq!(resolve_log_level(Some("warn"), temp.path()), "warn");
    }

    #[tokio::test]
    async fn input_lines_arrive_until_eof() {
        let mut lines = BufReader::new(&b"first\n\nexit\n"[..]).lines();
        let mut seen = Vec::new();
        while let Some(line) = next_input(&mut lines, std::future::pending()).await.unwrap() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["first", "", "exit"]);
    }

    #[tokio::test]
    async fn interrupt_at_the_prompt_ends_the_loop() {
        // Nothing is ever typed; the writer stays open so the read would block.
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();
        let next = next_input(&mut lines, async {}).await.unwrap();
        assert_eq!(next, None);
    }
}
