// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Both processes sharing a ring load the same file, which is how capacity
//! and message format reach the attaching side out-of-band.
//! Any invalid field results in a ConfigError.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, RingError, RingResult};
use crate::shm::MessageFormat;
use crate::sync::{BackoffPolicy, SpinPolicy, DEFAULT_SPIN_LIMIT};
use crate::types::{Capacity, RegionName};

/// Raw channel section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawChannelConfig {
    name: String,
    capacity: usize,
    #[serde(default)]
    message_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawBackoff {
    #[default]
    Spin,
    Yield,
    Sleep,
}

/// Raw spin section.
#[derive(Debug, Deserialize)]
struct RawSpinConfig {
    #[serde(default)]
    backoff: RawBackoff,
    #[serde(default = "default_spin_limit")]
    spin_limit: u32,
    #[serde(default = "default_min_sleep_us")]
    min_sleep_us: u64,
    #[serde(default = "default_max_sleep_us")]
    max_sleep_us: u64,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

fn default_spin_limit() -> u32 {
    DEFAULT_SPIN_LIMIT
}

fn default_min_sleep_us() -> u64 {
    1
}

fn default_max_sleep_us() -> u64 {
    1000
}

impl Default for RawSpinConfig {
    fn default() -> Self {
        Self {
            backoff: RawBackoff::default(),
            spin_limit: default_spin_limit(),
            min_sleep_us: default_min_sleep_us(),
            max_sleep_us: default_max_sleep_us(),
            timeout_ms: None,
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    channel: Option<RawChannelConfig>,
    #[serde(default)]
    spin: RawSpinConfig,
}

/// Validated channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub name: RegionName,
    pub capacity: Capacity,
    pub format: MessageFormat,
}

/// Validated spin configuration.
#[derive(Debug, Clone)]
pub struct SpinConfig {
    pub backoff: BackoffPolicy,
    pub timeout: Option<Duration>,
}

impl SpinConfig {
    /// Build the policy for blocking calls.
    pub fn policy(&self) -> SpinPolicy {
        let policy = SpinPolicy::new().with_backoff(self.backoff);
        match self.timeout {
            Some(timeout) => policy.with_timeout(timeout),
            None => policy,
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelConfig,
    pub spin: SpinConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> RingResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RingError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RingError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> RingResult<Config> {
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| RingError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> RingResult<Config> {
        let channel = raw.channel.ok_or(ConfigError::MissingRequiredField {
            field: "channel",
            context: "configuration root".to_string(),
        })?;

        Ok(Config {
            channel: Self::validate_channel(channel)?,
            spin: Self::validate_spin(raw.spin)?,
        })
    }

    /// Validate the channel section.
    fn validate_channel(raw: RawChannelConfig) -> Result<ChannelConfig, ConfigError> {
        let name = RegionName::new(raw.name)?;
        let capacity = Capacity::new(raw.capacity)?;

        if !capacity.is_power_of_two() {
            tracing::warn!(
                capacity = capacity.bytes(),
                "Capacity is not a power of two; offsets use true modulo"
            );
        }

        let format = match raw.message_size {
            Some(size) if size == 0 || size > capacity.bytes() => {
                return Err(ConfigError::InvalidFieldValue {
                    field: "message_size",
                    value: size.to_string(),
                    reason: format!("Must be between 1 and capacity ({})", capacity.bytes()),
                });
            }
            Some(size) => MessageFormat::Fixed(size),
            None => MessageFormat::Framed,
        };

        Ok(ChannelConfig {
            name,
            capacity,
            format,
        })
    }

    /// Validate the spin section.
    fn validate_spin(raw: RawSpinConfig) -> Result<SpinConfig, ConfigError> {
        if raw.spin_limit == 0 && !matches!(raw.backoff, RawBackoff::Spin) {
            return Err(ConfigError::InvalidFieldValue {
                field: "spin_limit",
                value: "0".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if raw.min_sleep_us > raw.max_sleep_us {
            return Err(ConfigError::InvalidFieldValue {
                field: "min_sleep_us",
                value: raw.min_sleep_us.to_string(),
                reason: format!("Must not exceed max_sleep_us ({})", raw.max_sleep_us),
            });
        }

        if raw.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidFieldValue {
                field: "timeout_ms",
                value: "0".to_string(),
                reason: "Timeout must be greater than 0 (omit for no deadline)".to_string(),
            });
        }

        let backoff = match raw.backoff {
            RawBackoff::Spin => BackoffPolicy::Spin,
            RawBackoff::Yield => BackoffPolicy::Yield {
                spin_limit: raw.spin_limit,
            },
            RawBackoff::Sleep => BackoffPolicy::Sleep {
                spin_limit: raw.spin_limit,
                min_sleep: Duration::from_micros(raw.min_sleep_us),
                max_sleep: Duration::from_micros(raw.max_sleep_us),
            },
        };

        Ok(SpinConfig {
            backoff,
            timeout: raw.timeout_ms.map(Duration::from_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
channel:
  name: market-feed
  capacity: 65536
  message_size: 64

spin:
  backoff: sleep
  spin_limit: 256
  min_sleep_us: 2
  max_sleep_us: 500
  timeout_ms: 250
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.channel.name.as_str(), "market-feed");
        assert_eq!(config.channel.capacity.bytes(), 65536);
        assert_eq!(config.channel.format, MessageFormat::Fixed(64));
        assert_eq!(
            config.spin.backoff,
            BackoffPolicy::Sleep {
                spin_limit: 256,
                min_sleep: Duration::from_micros(2),
                max_sleep: Duration::from_micros(500),
            }
        );
        assert_eq!(config.spin.timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.spin.policy().timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
channel:
  name: feed
  capacity: 4096
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        assert_eq!(config.channel.format, MessageFormat::Framed);
        assert_eq!(config.spin.backoff, BackoffPolicy::Spin);
        assert_eq!(config.spin.timeout, None);
    }

    #[test]
    fn test_missing_channel() {
        let yaml = r#"
spin:
  backoff: yield
"#;
        let result = ConfigLoader::load_string(yaml);
        assert!(matches!(
            result,
            Err(RingError::Config(ConfigError::MissingRequiredField { .. }))
        ));
    }

    #[test]
    fn test_invalid_region_name() {
        let yaml = r#"
channel:
  name: "bad/name"
  capacity: 4096
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_capacity_out_of_bounds() {
        let yaml = r#"
channel:
  name: feed
  capacity: 16
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_message_size_exceeds_capacity() {
        let yaml = r#"
channel:
  name: feed
  capacity: 1024
  message_size: 2048
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_sleep_bounds_inverted() {
        let yaml = r#"
channel:
  name: feed
  capacity: 1024
spin:
  backoff: sleep
  min_sleep_us: 100
  max_sleep_us: 10
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_unknown_backoff_rejected() {
        let yaml = r#"
channel:
  name: feed
  capacity: 1024
spin:
  backoff: futex
"#;
        assert!(matches!(
            ConfigLoader::load_string(yaml),
            Err(RingError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("shmring.yaml");
        std::fs::write(&path, VALID_CONFIG).unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(config.channel.capacity.bytes(), 65536);

        let missing = ConfigLoader::load_file(dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(RingError::ConfigNotFound { .. })));
    }
}
