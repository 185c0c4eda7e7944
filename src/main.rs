//! csql CLI

use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use csql::config::Config;
use csql::error::{CsqlError, FixSuggestion};

#[derive(Parser)]
#[command(name = "csql")]
#[command(about = "csql - browse database instances from the terminal")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/csql/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log file (default: <cache dir>/csql/csql.log)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive session (default)
    Tui,

    /// Print configured instances and their users
    List,

    /// Print the resolved config file path
    ConfigPath,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref(), cli.verbose);

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<CsqlError>().and_then(|e| e.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::ConfigPath => {
            println!("{}", config_path.display());
            Ok(())
        }
        Commands::List => {
            let config = load_config(&config_path)?;
            list_instances(&config);
            Ok(())
        }
        Commands::Tui => {
            if !std::io::stdout().is_terminal() {
                return Err(CsqlError::NotATerminal.into());
            }
            let config = load_config(&config_path)?;
            csql::tui::run(config).await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Ok(config)
}

fn list_instances(config: &Config) {
    if config.instances.is_empty() {
        println!("{}", "No instances configured".dimmed());
        return;
    }
    for instance in config.instances.values() {
        println!(
            "{} {} {}:{} {}",
            instance.name.cyan().bold(),
            instance.db_type,
            instance.host,
            instance.port,
            format!("({})", instance.source).dimmed()
        );
        for user in &instance.users {
            println!("  {} {} [auth={}]", "→".cyan(), user.username, user.auth_type);
        }
    }
}

/// The TUI owns the terminal, so logs go to a file. Without a writable log
/// file logging is off.
fn init_logging(log_file: Option<&Path>, verbose: bool) {
    let Some(path) = log_file.map(Path::to_path_buf).or_else(default_log_path) else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{} cannot open log file {}: {}", "Warning:".yellow(), path.display(), e);
            return;
        }
    };

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("csql").join("csql.log"))
}
