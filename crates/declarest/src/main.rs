// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarest - declarative resource engine.
//!
//! Binary entry point: loads configuration, then serves the synthesized
//! REST/WebSocket surface over the SQLite engine.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod maintenance;
mod serve;

/// Declarest - declarative resource engine.
#[derive(Parser, Debug)]
#[command(name = "declarest", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the resource engine server.
    Serve,
    /// Print the effective configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("declarest: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) | None => {
            if let Err(e) = serve::run(&config).await {
                eprintln!("declarest serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match render_config(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("declarest config: {e}");
                std::process::exit(1);
            }
        },
    }
}

fn render_config(config: &config::AppConfig) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(config)
}
