// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest data area accepted for a ring.
pub const MIN_CAPACITY: usize = 64;
/// Largest data area accepted for a ring: 1 GB
pub const MAX_CAPACITY: usize = 1024 * 1024 * 1024;

/// Longest region name accepted (POSIX NAME_MAX minus the leading slash, with headroom).
const MAX_NAME_LEN: usize = 250;

/// Validated shared memory region name.
/// Must be non-empty, at most 250 bytes, and contain no '/' or NUL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionName(String);

impl RegionName {
    /// Create a new RegionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Region name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Region name too long: {} bytes (max {})",
                    name.len(),
                    MAX_NAME_LEN
                ),
            });
        }

        if name.contains('/') || name.contains('\0') {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Region name must not contain '/' or NUL".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name as passed to `shm_open`, with the leading slash.
    pub fn os_name(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RegionName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionName> for String {
    fn from(name: RegionName) -> Self {
        name.0
    }
}

/// Validated data-area capacity in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Capacity(usize);

impl Capacity {
    /// Create a new Capacity with bounds validation.
    pub fn new(bytes: usize) -> Result<Self, ConfigError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&bytes) {
            return Err(ConfigError::InvalidFieldValue {
                field: "capacity",
                value: bytes.to_string(),
                reason: format!("Must be between {} and {} bytes", MIN_CAPACITY, MAX_CAPACITY),
            });
        }
        Ok(Self(bytes))
    }

    /// Get the value in bytes.
    pub fn bytes(&self) -> usize {
        self.0
    }

    /// Whether offsets reduce to a bitmask.
    pub fn is_power_of_two(&self) -> bool {
        self.0.is_power_of_two()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 * 1024 && self.0 % (1024 * 1024) == 0 {
            write!(f, "{}MB", self.0 / (1024 * 1024))
        } else if self.0 >= 1024 && self.0 % 1024 == 0 {
            write!(f, "{}KB", self.0 / 1024)
        } else {
            write!(f, "{}B", self.0)
        }
    }
}

impl TryFrom<usize> for Capacity {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capacity> for usize {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}
