// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shmring.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for shmring.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum RingError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Memory Errors - No Fallback to Alternative IPC
    // =========================================================================
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] ShmError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors cause immediate termination of the caller.
/// Used when a setting is invalid and the channel cannot safely be built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Shared region lifecycle errors - fatal, surfaced to the caller, never retried.
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("Failed to allocate shared memory region '{name}': {reason}")]
    Allocation { name: String, reason: String },

    #[error("Shared memory region '{name}' not found")]
    NotFound { name: String },

    #[error("Capacity mismatch for region '{name}': expected {expected} bytes, region has {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to map shared memory region '{name}': {reason}")]
    Map { name: String, reason: String },

    #[error("Region '{name}' is not a valid ring: {reason}")]
    InvalidRegion { name: String, reason: String },
}

/// Channel operation errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Caller violated the payload size contract. Never retried.
    #[error("Invalid payload length {len}: {reason}")]
    InvalidLength { len: usize, reason: String },

    /// Not enough space (send) or data (receive) right now.
    #[error("Operation would block")]
    WouldBlock,

    #[error("Blocking operation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Blocking operation cancelled")]
    Cancelled,

    #[error("Frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Corrupt frame in ring: {reason}")]
    CorruptFrame { reason: String },

    #[error(transparent)]
    Region(#[from] ShmError),
}

impl ChannelError {
    /// True for the expected backpressure/empty signal of non-blocking calls.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// True when shared state was left untouched and the call may be repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::Timeout { .. } | Self::Cancelled)
    }
}

/// Result type alias using RingError.
pub type RingResult<T> = Result<T, RingError>;
