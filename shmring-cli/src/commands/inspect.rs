// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmring inspect` command - Show cursor state of a live region.
//!
//! Attaches read-only in spirit: only the header is loaded, never a cursor
//! stored.

use shmring_core::{ConfigLoader, SharedRegion};

pub fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let name = &config.channel.name;

    let region = SharedRegion::attach_discovered(name)?;
    if region.capacity() != config.channel.capacity.bytes() {
        tracing::warn!(
            configured = config.channel.capacity.bytes(),
            actual = region.capacity(),
            "Region capacity differs from configuration"
        );
    }

    let snapshot = region.snapshot().ok_or("region detached")?;
    let fill = snapshot.occupied() as f64 / snapshot.capacity as f64 * 100.0;

    println!("Region '{}'", name);
    println!("  Capacity:   {} bytes", snapshot.capacity);
    println!("  Write pos:  {}", snapshot.write_pos);
    println!("  Read pos:   {}", snapshot.read_pos);
    println!("  Occupied:   {} bytes ({:.1}%)", snapshot.occupied(), fill);
    println!("  Free:       {} bytes", snapshot.free_space());
    if !snapshot.holds_invariant() {
        println!("  ✗ Cursors are inconsistent");
    }
    Ok(())
}
