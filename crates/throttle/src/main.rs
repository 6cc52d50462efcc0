// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Throttle - a cost-aware LLM router and protocol-translating proxy.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod shutdown;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use throttle_config::{ConfigError, ThrottleConfig};
use throttle_core::{RoutingMode, ThrottleError};
use throttle_gateway::RouteHints;

/// Throttle - route each LLM request to the cheapest model that can handle it.
#[derive(Parser, Debug)]
#[command(name = "throttle", version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: XDG lookup plus ./throttle.toml).
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the proxy server.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Routing mode to start in (eco, standard, performance).
        #[arg(long)]
        mode: Option<RoutingMode>,
    },
    /// Score a prompt without routing it.
    Classify {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show which model a prompt would be sent to, without calling it.
    Route {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        /// Model alias or id to force.
        #[arg(long)]
        force_model: Option<String>,
        /// Inherit the route of an earlier request.
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        mode: Option<RoutingMode>,
        #[arg(long)]
        json: bool,
    },
    /// Cost and savings summary from the routing log.
    Stats {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Most recent routing log entries.
    Log {
        #[arg(long, default_value_t = 20)]
        tail: usize,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration with API keys masked.
    Config,
}

fn load_config(path: Option<&Path>) -> Result<ThrottleConfig, Vec<ConfigError>> {
    match path {
        Some(path) => throttle_config::load_and_validate_path(path),
        None => throttle_config::load_and_validate(),
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("throttle={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

async fn run(
    command: Commands,
    mut config: ThrottleConfig,
) -> Result<Option<String>, ThrottleError> {
    match command {
        Commands::Serve { host, port, mode } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(mode) = mode {
                config.routing.mode = mode;
            }
            serve::run_serve(config).await?;
            Ok(None)
        }
        Commands::Classify {
            prompt,
            system,
            json,
        } => commands::classify(&config, &prompt, system, json).map(Some),
        Commands::Route {
            prompt,
            system,
            force_model,
            parent,
            mode,
            json,
        } => {
            if let Some(mode) = mode {
                config.routing.mode = mode;
            }
            let hints = RouteHints {
                force_model,
                parent_request_id: parent,
            };
            commands::route(config, &prompt, system, hints, json)
                .await
                .map(Some)
        }
        Commands::Stats { days, json } => commands::stats(config, days, json).await.map(Some),
        Commands::Log { tail, json } => commands::log(config, tail, json).await.map(Some),
        Commands::Config => commands::show_config(&config).map(Some),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            throttle_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging.log_level);

    let Some(command) = cli.command else {
        eprintln!("throttle: use --help for available commands");
        return ExitCode::SUCCESS;
    };

    match run(command, config).await {
        Ok(Some(output)) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("throttle: {e}");
            ExitCode::FAILURE
        }
    }
}
