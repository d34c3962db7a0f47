//! # Hub Configuration
//!
//! The `[hub]` section of the service config file.
//!
//! ```toml
//! [hub]
//! redis_url = "redis://127.0.0.1:6379"   # omit for a single in-process instance
//! channel = "order_updates"
//! terminal_buffer = 64
//! reconnect_initial_ms = 500
//! reconnect_max_ms = 30000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{HubError, HubResult};

/// Default pub/sub channel shared by every instance.
pub const DEFAULT_CHANNEL: &str = "order_updates";

/// Default outbound queue depth per terminal.
pub const DEFAULT_TERMINAL_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Redis URL for cross-instance broadcast. `None` keeps events in-process.
    pub redis_url: Option<String>,

    pub channel: String,

    /// Events queued per terminal before it is dropped as too slow.
    pub terminal_buffer: usize,

    pub reconnect_initial_ms: u64,

    pub reconnect_max_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            redis_url: None,
            channel: DEFAULT_CHANNEL.to_string(),
            terminal_buffer: DEFAULT_TERMINAL_BUFFER,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
        }
    }
}

impl HubConfig {
    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> HubResult<()> {
        if self.channel.trim().is_empty() {
            return Err(HubError::InvalidConfig("channel must not be empty".into()));
        }
        if self.terminal_buffer == 0 {
            return Err(HubError::InvalidConfig(
                "terminal_buffer must be at least 1".into(),
            ));
        }
        if self.reconnect_initial_ms == 0 || self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(HubError::InvalidConfig(format!(
                "reconnect_initial_ms ({}) must be in 1..={}",
                self.reconnect_initial_ms, self.reconnect_max_ms
            )));
        }
        if let Some(url) = &self.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(HubError::InvalidConfig(format!(
                    "redis_url must use redis:// or rediss://, got {url}"
                )));
            }
        }
        Ok(())
    }
}
