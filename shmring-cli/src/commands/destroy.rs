// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmring destroy` command - Unlink the configured region.

use shmring_core::{ConfigLoader, SharedRegion, ShmError};

pub fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let name = &config.channel.name;

    match SharedRegion::destroy(name) {
        Ok(()) => {
            println!("✓ Destroyed region '{}'", name);
            Ok(())
        }
        Err(ShmError::NotFound { .. }) => {
            println!("Region '{}' does not exist", name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
