// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmring validate` command - Validate configuration file.

use shmring_core::{BackoffPolicy, ConfigLoader};

pub fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Channel:");
            println!("  Name:     {}", config.channel.name);
            println!("  Capacity: {}", config.channel.capacity);
            println!("  Format:   {}", config.channel.format);
            println!();
            println!("Spin Policy:");
            match config.spin.backoff {
                BackoffPolicy::Spin => println!("  Backoff:  spin"),
                BackoffPolicy::Yield { spin_limit } => {
                    println!("  Backoff:  yield after {} spins", spin_limit)
                }
                BackoffPolicy::Sleep {
                    spin_limit,
                    min_sleep,
                    max_sleep,
                } => println!(
                    "  Backoff:  sleep after {} spins ({:?}..{:?})",
                    spin_limit, min_sleep, max_sleep
                ),
            }
            match config.spin.timeout {
                Some(timeout) => println!("  Timeout:  {:?}", timeout),
                None => println!("  Timeout:  none"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
