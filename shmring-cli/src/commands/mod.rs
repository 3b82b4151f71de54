// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod create;
pub mod destroy;
pub mod inspect;
pub mod recv;
pub mod send;
pub mod validate;

use std::io;

/// Errors raised by the streaming commands outside the core library.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Line of {len} bytes exceeds the fixed message size of {size}")]
    Oversized { len: usize, size: usize },
}
