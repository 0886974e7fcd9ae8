//! Event bus configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Upper bound accepted for `max_concurrent_handlers`.
///
/// Mirrors the permit limit of `tokio::sync::Semaphore`, shifted well below it.
pub const MAX_CONCURRENT_HANDLERS_LIMIT: usize = 1 << 20;

/// Event bus configuration
///
/// `BusConfig::default()` is what a bus built without explicit settings uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Channel capacity used when a subscriber asks for an invalid (zero) size
    #[serde(default = "default_buffer_size")]
    pub default_buffer_size: usize,

    /// Reserved for blocking publish variants; not consulted by the bus yet
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Async handler invocations allowed to run at the same time
    #[serde(default = "default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,
}

impl BusConfig {
    /// Reserved publish timeout as a `Duration`
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Resolve a requested channel capacity, falling back to the default
    pub fn buffer_size_or_default(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_buffer_size.max(1)
        } else {
            requested
        }
    }

    /// Validate bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_buffer_size == 0 {
            return Err(ValidationError::InvalidBufferSize);
        }
        if self.default_timeout_secs == 0 || self.default_timeout_secs > 3600 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_concurrent_handlers == 0
            || self.max_concurrent_handlers > MAX_CONCURRENT_HANDLERS_LIMIT
        {
            return Err(ValidationError::InvalidConcurrency {
                max: MAX_CONCURRENT_HANDLERS_LIMIT,
            });
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_buffer_size: default_buffer_size(),
            default_timeout_secs: default_timeout_secs(),
            max_concurrent_handlers: default_max_concurrent_handlers(),
        }
    }
}

fn default_buffer_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_handlers() -> usize {
    1024
}
