#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
//! `TierCache` CLI - configuration inspection and synthetic workloads
//!
//! Usage:
//!   `tiercache config --config ./tiercache.toml`
//!   `tiercache simulate --keys 500 --reads 20000 --warm 50`
//!   `tiercache simulate --format json`

mod report;
mod simulate;
#[cfg(test)]
mod simulate_tests;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tiercache_core::TierCacheConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tiercache")]
#[command(author, version, about = "TierCache CLI - multi-tier in-process cache")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Report output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config {
        /// Path to configuration file
        #[arg(short, long, env = "TIERCACHE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Run a synthetic workload and print the performance report
    Simulate {
        /// Path to configuration file
        #[arg(short, long, env = "TIERCACHE_CONFIG")]
        config: Option<PathBuf>,

        /// Number of keys to populate
        #[arg(long, default_value = "200")]
        keys: usize,

        /// Number of reads to issue
        #[arg(long, default_value = "5000")]
        reads: usize,

        /// Number of extra keys to warm through the loader
        #[arg(long, default_value = "20")]
        warm: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TierCacheConfig> {
    let config = match path {
        Some(path) => TierCacheConfig::load_from_path(path)?,
        None => TierCacheConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &TierCacheConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so JSON reports on stdout stay parseable.
    if config.logging.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml()?);
        }
        Commands::Simulate {
            config,
            keys,
            reads,
            warm,
            format,
        } => {
            let config = load_config(config.as_deref())?;
            init_tracing(&config);

            let workload = simulate::Workload { keys, reads, warm };
            let outcome = simulate::run(config, &workload).await?;

            match format {
                OutputFormat::Json => report::print_json(&outcome)?,
                OutputFormat::Text => report::print_text(&outcome),
            }
        }
    }

    Ok(())
}
