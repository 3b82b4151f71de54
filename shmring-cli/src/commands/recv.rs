// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmring recv` command - Print received messages.
//!
//! Runs until `--count` messages arrive, or until the configured timeout
//! expires with the ring empty. Fixed-size messages have trailing NUL bytes
//! stripped, which removes the padding `shmring send` adds but also any NUL
//! bytes a payload genuinely ended with.

use std::io::{self, Write};
use std::sync::Arc;

use shmring_core::{ChannelError, ConfigLoader, Consumer, MessageFormat, SharedRegion};

use super::CliError;

pub fn execute(config_path: &str, count: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let channel = &config.channel;
    let policy = config.spin.policy();

    let region = SharedRegion::attach(&channel.name, channel.capacity)?;
    let mut consumer = Consumer::new(Arc::new(region), channel.format)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut received = 0u64;

    while count.map_or(true, |limit| received < limit) {
        let mut message = match consumer.recv_blocking(&policy) {
            Ok(message) => message,
            Err(ChannelError::Timeout { elapsed }) => {
                tracing::info!(?elapsed, "No message before timeout");
                break;
            }
            Err(e @ ChannelError::ChecksumMismatch { .. }) => {
                tracing::warn!(error = %e, "Dropped corrupt message");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if let MessageFormat::Fixed(_) = channel.format {
            strip_padding(&mut message);
        }

        out.write_all(&message)
            .and_then(|()| out.write_all(b"\n"))
            .map_err(|source| CliError::Io {
                context: "writing stdout",
                source,
            })?;
        received += 1;
    }

    out.flush().map_err(|source| CliError::Io {
        context: "writing stdout",
        source,
    })?;

    let stats = consumer.stats();
    tracing::info!(
        messages = stats.messages,
        checksum_failures = stats.checksum_failures,
        "Finished receiving"
    );
    Ok(())
}

/// Drop the zero padding from the end of a fixed-size message.
fn strip_padding(message: &mut Vec<u8>) {
    let end = message.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    message.truncate(end);
}
