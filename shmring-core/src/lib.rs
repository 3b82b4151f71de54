//! shmring Core Library
//!
//! Lock-free single-producer/single-consumer message channel over a POSIX
//! shared memory region. Provides the region wrapper, ring header layout,
//! producer/consumer handles, the spin/backoff protocol, and configuration.

pub mod channel;
pub mod config;
pub mod error;
pub mod shm;
pub mod stats;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use channel::{channel, Consumer, Producer};
pub use config::{ChannelConfig, Config, ConfigLoader, SpinConfig};
pub use error::{ChannelError, ConfigError, RingError, RingResult, ShmError};
pub use shm::{MessageFormat, RingSnapshot, SharedRegion};
pub use stats::ChannelStats;
pub use sync::{BackoffPolicy, CancelToken, SpinPolicy, SpinState, Spinner};
pub use types::{Capacity, RegionName};
