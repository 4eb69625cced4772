//! Style Imitator CLI - main entry point
//!
//! Offline access to the imitation pipeline: inspect exports, build
//! fingerprints and try replies without running the bot.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use style_imitator::{commands, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "style_imitator")]
#[command(about = "Chat-style imitation from Telegram exports", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show participants of an export, or dump one author's messages
    Extract {
        /// Path to the exported messages.html
        path: PathBuf,

        /// Owner name (defaults to the export page header)
        #[arg(long)]
        owner: Option<String>,

        /// Print messages of this author (3+ words each)
        #[arg(short, long)]
        author: Option<String>,

        /// Output format: table | json | yaml
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Build the style fingerprint of one author
    Profile {
        /// Path to the exported messages.html
        path: PathBuf,

        /// Author name as it appears in the export
        author: String,

        /// Output format: table | json | yaml
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Answer messages in the style of an export participant
    Reply {
        /// Path to the exported messages.html
        path: PathBuf,

        /// Participant to imitate
        target: String,

        /// Message to answer (repeatable); stdin lines when omitted
        #[arg(short, long)]
        message: Vec<String>,

        /// Config file (defaults to ./config.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for reproducible sampling and noise
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Extract { .. } => "extract",
            Commands::Profile { .. } => "profile",
            Commands::Reply { .. } => "reply",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("style_imitator=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    let start = Instant::now();
    let result = execute_command(cli.command).await;
    metrics::record_command(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Extract {
            path,
            owner,
            author,
            format,
        } => {
            commands::extract::run(&path, owner.as_deref(), author.as_deref(), &format).await?;
        }
        Commands::Profile {
            path,
            author,
            format,
        } => {
            commands::profile::run(&path, &author, &format).await?;
        }
        Commands::Reply {
            path,
            target,
            message,
            config,
            seed,
        } => {
            commands::reply::run(commands::ReplyArgs {
                path,
                target,
                messages: message,
                config,
                seed,
            })
            .await?;
        }
    }
    Ok(())
}
