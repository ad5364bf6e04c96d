use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use terminus::config::{Config, MissPolicy};
use terminus::content::SiteContent;
use terminus::storage::{self, FileStore, KeyValueStore};
use terminus::tui::TuiRunner;

#[derive(Parser)]
#[command(name = "terminus")]
#[command(about = "Interactive portfolio terminal with an AI assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the terminal
    Run {
        /// JSON file with the site content (overrides the config)
        #[arg(short, long)]
        content: Option<PathBuf>,
        /// What to do with unknown commands: assistant or suggest
        #[arg(long)]
        miss_policy: Option<MissPolicy>,
    },
    /// Configure terminus
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
        /// Set model
        #[arg(long)]
        model: Option<String>,
        /// Set the unknown-command policy
        #[arg(long)]
        miss_policy: Option<MissPolicy>,
    },
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key
    Set { token: String },
    /// Remove the stored API key
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            content,
            miss_policy,
        } => {
            run_terminal(content, miss_policy).await?;
        }
        Commands::Config {
            show,
            model,
            miss_policy,
        } => {
            handle_config(show, model, miss_policy)?;
        }
        Commands::Key { action } => {
            handle_key(action)?;
        }
    }

    Ok(())
}

/// The TUI owns stdout, so logs go to a file
fn init_tracing() -> Result<()> {
    let log_path = Config::log_path()?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terminus=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    Ok(())
}

async fn run_terminal(content: Option<PathBuf>, miss_policy: Option<MissPolicy>) -> Result<()> {
    let mut config = Config::load()?;

    if let Some(policy) = miss_policy {
        config.assistant.miss_policy = policy;
    }
    let content_path = content.or_else(|| config.site.content_path.clone());
    let site = SiteContent::load_optional(content_path.as_deref())?;

    tracing::info!(
        "Starting terminal ({} posts, miss policy {:?})",
        site.posts().len(),
        config.assistant.miss_policy
    );

    let mut runner = TuiRunner::new(config, site);
    runner.run().await
}

fn handle_config(show: bool, model: Option<String>, miss_policy: Option<MissPolicy>) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut changed = false;

    if let Some(m) = model {
        config.assistant.model = m;
        changed = true;
        println!("Model updated");
    }

    if let Some(policy) = miss_policy {
        config.assistant.miss_policy = policy;
        changed = true;
        println!("Miss policy updated");
    }

    if changed {
        config.save()?;
        println!("Configuration saved to: {:?}", Config::config_path()?);
    } else {
        println!("No changes made. Use --show to view current configuration.");
    }

    Ok(())
}

fn handle_key(action: KeyAction) -> Result<()> {
    let config = Config::load()?;
    let mut store = FileStore::open(config.storage_path()?).context("Failed to open storage")?;

    match action {
        KeyAction::Set { token } => {
            store
                .set(storage::CREDENTIAL_KEY, &token)
                .context("Failed to store API key")?;
            println!("API key set: {}", storage::mask_credential(&token));
        }
        KeyAction::Clear => {
            store
                .remove(storage::CREDENTIAL_KEY)
                .context("Failed to clear API key")?;
            println!("API key cleared.");
        }
    }

    Ok(())
}
