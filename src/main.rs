use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use widgetdeck::DeckConfig;

mod cli;

#[derive(Parser)]
#[command(name = "widgetdeck")]
#[command(
    about = "Personal productivity dashboard with a sandboxed plugin runtime",
    long_about = None
)]
struct Cli {
    /// Config file to use instead of ~/.widgetdeck/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and validate plugin manifests
    Plugins {
        /// Extra directory to scan (repeatable)
        #[arg(long)]
        dir: Vec<PathBuf>,
    },
    /// List the command palette
    Commands {
        /// Include commands of disabled plugins
        #[arg(long)]
        all: bool,
    },
    /// Resolve a spoken phrase and run the matching command
    Voice {
        /// The transcript, e.g. `widgetdeck voice start timer`
        #[arg(required = true)]
        transcript: Vec<String>,
        /// Only show which command would run
        #[arg(long)]
        dry_run: bool,
    },
    /// Show plugin states and registry sizes
    Status,
    /// Show version information
    Version,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<DeckConfig> {
    let mut config = match path {
        Some(path) => DeckConfig::load_from_path(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => return DeckConfig::load().with_context(|| "Failed to load configuration"),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    // Initialize logging: RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Some(Commands::Version) | None => {
            println!("widgetdeck {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Plugins { dir }) => cli::cmd_plugins(config, dir)?,
        Some(Commands::Commands { all }) => cli::cmd_commands(config, all).await?,
        Some(Commands::Voice {
            transcript,
            dry_run,
        }) => cli::cmd_voice(config, transcript.join(" "), dry_run).await?,
        Some(Commands::Status) => cli::cmd_status(config).await?,
    }

    Ok(())
}
