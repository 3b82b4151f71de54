// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use serde::{Deserialize, Serialize};

/// Process-local counters for one channel handle.
/// Never stored in shared memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub messages: u64,
    pub bytes: u64,
    pub would_block: u64,
    pub timeouts: u64,
    pub cancellations: u64,
    pub checksum_failures: u64,
}

impl ChannelStats {
    pub(crate) fn record_message(&mut self, payload_len: usize) {
        self.messages += 1;
        self.bytes += payload_len as u64;
    }

    /// Count a failed call by kind. Other errors are not tracked.
    pub(crate) fn record_error(&mut self, err: &crate::error::ChannelError) {
        use crate::error::ChannelError;
        match err {
            ChannelError::WouldBlock => self.would_block += 1,
            ChannelError::Timeout { .. } => self.timeouts += 1,
            ChannelError::Cancelled => self.cancellations += 1,
            ChannelError::ChecksumMismatch { .. } => self.checksum_failures += 1,
            _ => {}
        }
    }
}
