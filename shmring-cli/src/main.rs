// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmring CLI
//!
//! Command-line interface for creating, inspecting and exercising
//! shared-memory SPSC channels.

use clap::{Parser, Subcommand};

mod commands;

/// shmring - Lock-free shared-memory message channels
#[derive(Parser)]
#[command(name = "shmring")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "shmring.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the configured region and leave it in place
    Create {
        /// Replace a stale region with the same name
        #[arg(short, long)]
        force: bool,
    },

    /// Unlink the configured region
    Destroy,

    /// Print cursors and occupancy of the configured region
    Inspect,

    /// Send each line of stdin as one message
    Send,

    /// Receive messages and print them to stdout
    Recv {
        /// Stop after this many messages
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file (defaults to --config)
        file: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Create { force } => commands::create::execute(&cli.config, force),
        Commands::Destroy => commands::destroy::execute(&cli.config),
        Commands::Inspect => commands::inspect::execute(&cli.config),
        Commands::Send => commands::send::execute(&cli.config),
        Commands::Recv { count } => commands::recv::execute(&cli.config, count),
        Commands::Validate { file } => {
            commands::validate::execute(file.as_deref().unwrap_or(&cli.config))
        }
    }
}
