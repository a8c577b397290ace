//! KDM CLI
//!
//! A command-line tool for reading container usage and managing deployment
//! rollouts through the KDM management server.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{health, rollout, usage};

/// KDM container and cluster manager CLI
#[derive(Parser)]
#[command(name = "kdm")]
#[command(author, version, about = "CLI for the KDM container and cluster manager", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via KDM_API_URL env var)
    #[arg(long, env = "KDM_API_URL")]
    pub api_url: Option<String>,

    /// Namespace for deployment commands (server default if not specified)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show current resource usage of a container
    Stats {
        /// Container ID or name
        container: String,
    },

    /// Compute usage from a saved Docker stats document, without a server
    Usage {
        /// Path to the stats JSON document, or - for stdin
        file: String,
    },

    /// Show revision history of a deployment
    History {
        /// Deployment name
        deployment: String,
    },

    /// Roll a deployment back to an earlier revision
    Rollback {
        /// Deployment name
        deployment: String,

        /// Revision to restore (previous revision if not specified)
        #[arg(long)]
        to_revision: Option<u64>,
    },

    /// Show server health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let api_url = cli
        .api_url
        .or(config.api_url)
        .unwrap_or_else(|| config::DEFAULT_API_URL.to_string());
    let namespace = cli.namespace.or(config.default_namespace);
    let format = match (cli.format, config.default_format.as_deref()) {
        (Some(format), _) => format,
        (None, Some(name)) => output::OutputFormat::from_str(name, true)
            .map_err(|e| anyhow::anyhow!("Invalid default_format in config file: {}", e))?,
        (None, None) => output::OutputFormat::default(),
    };

    if cli.verbose {
        output::print_info(&format!("Using API at {}", api_url));
        if let Some(ns) = &namespace {
            output::print_info(&format!("Using namespace {}", ns));
        }
    }

    // Offline computation needs no server
    if let Commands::Usage { file } = &cli.command {
        return usage::compute_offline(file, format);
    }

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Stats { container } => {
            usage::show_container_stats(&client, &container, format).await?;
        }
        Commands::History { deployment } => {
            rollout::show_history(&client, namespace.as_deref(), &deployment, format).await?;
        }
        Commands::Rollback {
            deployment,
            to_revision,
        } => {
            rollout::rollback(
                &client,
                namespace.as_deref(),
                &deployment,
                to_revision,
                format,
            )
            .await?;
        }
        Commands::Health => {
            health::show_health(&client, format).await?;
        }
        Commands::Usage { .. } => {}
    }

    Ok(())
}
