// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmring send` command - Publish stdin lines as messages.
//!
//! Each line (without its newline) becomes one message. Fixed-size channels
//! zero-pad shorter lines; `shmring recv` strips that padding again, so
//! lines ending in NUL bytes lose those bytes on the way through. Framed
//! channels cannot carry empty messages, so blank lines are skipped there.

use std::io::{self, BufRead};
use std::sync::Arc;

use shmring_core::{ConfigLoader, MessageFormat, Producer, SharedRegion};

use super::CliError;

pub fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let channel = &config.channel;
    let policy = config.spin.policy();

    let region = SharedRegion::attach(&channel.name, channel.capacity)?;
    let mut producer = Producer::new(Arc::new(region), channel.format)?;

    let stdin = io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.map_err(|source| CliError::Io {
            context: "reading stdin",
            source,
        })?;

        match line_payload(line, channel.format)? {
            Some(payload) => producer.send_blocking(&payload, &policy)?,
            None => tracing::debug!(line = index + 1, "Skipping blank line"),
        }
    }

    let stats = producer.stats();
    tracing::info!(
        messages = stats.messages,
        bytes = stats.bytes,
        "Finished sending"
    );
    Ok(())
}

/// Turn one stdin line into a message payload for `format`.
///
/// Returns `None` for lines that produce no message.
fn line_payload(line: String, format: MessageFormat) -> Result<Option<Vec<u8>>, CliError> {
    let mut payload = line.into_bytes();
    match format {
        MessageFormat::Fixed(size) => {
            if payload.len() > size {
                return Err(CliError::Oversized {
                    len: payload.len(),
                    size,
                });
            }
            payload.resize(size, 0);
            Ok(Some(payload))
        }
        MessageFormat::Framed if payload.is_empty() => Ok(None),
        MessageFormat::Framed => Ok(Some(payload)),
    }
}
