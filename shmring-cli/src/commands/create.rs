// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmring create` command - Create the configured region.
//!
//! The region outlives this process; `shmring destroy` removes it.

use shmring_core::{ConfigLoader, SharedRegion, ShmError};

pub fn execute(config_path: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let channel = &config.channel;

    if force {
        match SharedRegion::destroy(&channel.name) {
            Ok(()) => tracing::warn!(name = %channel.name, "Removed existing region"),
            Err(ShmError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let mut region = SharedRegion::create(&channel.name, channel.capacity)?;
    region.disown();

    println!("✓ Created region '{}'", channel.name);
    println!("  Capacity: {}", channel.capacity);
    println!("  Format:   {}", channel.format);
    Ok(())
}
