#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]
#![allow(clippy::print_stdout)]

//! DXplorer key generator CLI
//!
//! Prints access keys for a device. Logs go to stderr so stdout carries only
//! the key (or the inspection report).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dxkey::{
    commands,
    config::{Config, Overrides, DEFAULT_CONFIG_PATH},
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dxkey")]
#[command(about = "Generate DXplorer access keys from device credentials", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (YAML)
    #[arg(long, global = true, env = "DXKEY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter, overrides logging.level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key
    Generate {
        /// Device identifier
        #[arg(long)]
        device_id: Option<u64>,

        /// Change counter; bump it to invalidate earlier keys
        #[arg(long)]
        counter: Option<u64>,

        /// Operator callsign
        #[arg(long)]
        callsign: Option<String>,

        /// Device secret as hex (prefer --secret-file; command lines end up in shell history)
        #[arg(long, conflicts_with = "secret_file")]
        secret_hex: Option<String>,

        /// File holding the device secret as hex
        #[arg(long)]
        secret_file: Option<PathBuf>,
    },

    /// Show the device id, change counter and digest packed into a key
    Inspect {
        /// The key to inspect
        key: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration first (fail-fast)
    let config = Config::load_from(&cli.config).map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut overrides = Overrides {
        log_level: cli.log_level,
        ..Overrides::default()
    };

    if let Commands::Generate {
        device_id,
        counter,
        callsign,
        secret_hex,
        secret_file,
    } = &cli.command
    {
        overrides.device_id = *device_id;
        overrides.change_counter = *counter;
        overrides.callsign.clone_from(callsign);
        overrides.secret_hex = match secret_file {
            Some(path) => Some(
                commands::read_secret_file(path)
                    .with_context(|| format!("reading secret file {}", path.display()))?,
            ),
            None => secret_hex.clone(),
        };
    }

    let config = config
        .apply(overrides)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    init_tracing(&config.logging.level);
    tracing::debug!(config = ?config, "configuration loaded");

    match cli.command {
        Commands::Generate { .. } => {
            let request = config.key_request().map_err(|e| anyhow::anyhow!("{e}"))?;
            let key = commands::generate(&request);
            println!("{key}");
        }
        Commands::Inspect { key, json } => {
            let inspection = commands::inspect(&key).context("inspecting key")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                println!("{inspection}");
            }
        }
    }

    Ok(())
}
