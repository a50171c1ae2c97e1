// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pulse - real-time presence, messaging and notification sync client.
//!
//! This is the binary entry point for the Pulse client.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse_core::DeviceClass;

/// Pulse - real-time presence, messaging and notification sync client.
#[derive(Parser, Debug)]
#[command(name = "pulse", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a session and log feed, message and presence events until Ctrl+C.
    Watch {
        /// User to register as (overrides `session.user_id`).
        #[arg(long)]
        user: Option<String>,
        /// Device class to announce (overrides `session.device_class`).
        #[arg(long)]
        device: Option<DeviceClass>,
        /// Push broker endpoint (overrides `push.endpoint`).
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the resolved configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let loaded = match cli.config.as_deref() {
        Some(path) => pulse_config::load_and_validate_path(path),
        None => pulse_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            pulse_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Watch {
            user,
            device,
            endpoint,
        }) => {
            let options = watch::WatchOptions {
                user,
                device,
                endpoint,
            };
            if let Err(e) = watch::run_watch(config, options).await {
                eprintln!("pulse: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("pulse: failed to render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("pulse: use --help for available commands");
        }
    }
}
