mod commands;
mod config;
mod runtime;
mod sources;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chainseries")]
#[command(about = "Block-height sampling of contract state with warehouse publishing")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to config/chainseries.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample a group's sources up to the chain head
    Collect(commands::collect::CollectArgs),
    /// Publish persisted series to the warehouse
    Publish {
        #[arg(long)]
        group: String,
    },
    /// Show the creation block of each source in a group
    CreationHeights {
        #[arg(long)]
        group: String,
    },
    /// List configured groups and sources
    Groups,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chainseries=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            tracing::warn!("{} step(s) failed", failures);
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<usize> {
    let config = config::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Groups => {
            commands::groups::handle_groups_command(&config)?;
            Ok(0)
        }
        Commands::Collect(args) => {
            let runtime = runtime::Runtime::open(config)?;
            commands::collect::handle_collect_command(args, &runtime).await
        }
        Commands::Publish { group } => {
            let runtime = runtime::Runtime::open(config)?;
            commands::publish::handle_publish_command(&group, &runtime).await
        }
        Commands::CreationHeights { group } => {
            let runtime = runtime::Runtime::open(config)?;
            commands::creation_heights::handle_creation_heights_command(&group, &runtime).await
        }
    }
}
