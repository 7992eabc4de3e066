use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperboy::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "paperboy",
    version,
    about = "Polls newspapers and delivers each new issue as soon as it is published",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $PAPERBOY_CONFIG, then ./paperboy.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start polling the configured sources
    Run {
        /// Only poll these sources (repeatable)
        #[arg(short, long = "source", value_name = "NAME")]
        sources: Vec<String>,
    },

    /// List configured sources and their next attempt
    Sources,

    /// List archived issues
    Issues {
        /// Only show issues of this newspaper
        #[arg(short, long)]
        newspaper: Option<String>,

        /// Maximum number of issues to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Validate the configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize tracing/logging
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Run { sources } => {
            tracing::info!(sources = ?sources, "Starting run command");
            commands::run(config, sources).await?;
        }
        Commands::Sources => commands::sources(&config)?,
        Commands::Issues { newspaper, limit } => {
            commands::issues(&config, newspaper.as_deref(), limit)?;
        }
        Commands::Check => commands::check(&config)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("paperboy=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("paperboy={level},warn")))?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}
