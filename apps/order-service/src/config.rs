//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ORDERLINE_DATABASE_PATH=/var/lib/orderline/orderline.db            │
//! │     ORDERLINE_REDIS_URL=redis://cache:6379                             │
//! │     ORDERLINE_EVENT_CHANNEL=order_updates                              │
//! │     ORDERLINE_BIND_ADDR=0.0.0.0:8080                                   │
//! │     ORDERLINE_OPERATION_TIMEOUT_MS=5000                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, else $ORDERLINE_CONFIG, else                      │
//! │     ~/.config/orderline/service.toml (Linux)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/orderline/orderline.db"
//! max_connections = 8
//! busy_timeout_ms = 5000
//!
//! [hub]
//! redis_url = "redis://127.0.0.1:6379"
//! channel = "order_updates"
//! terminal_buffer = 64
//!
//! [orders]
//! number_prefix = "ORD"
//! max_items = 100
//! max_quantity = 999
//!
//! [server]
//! bind_addr = "0.0.0.0:8080"
//! operation_timeout_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use orderline_core::validation::OrderLimits;
use orderline_core::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};
use orderline_db::DbConfig;
use orderline_hub::{HubConfig, HubError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<HubError> for ConfigError {
    fn from(err: HubError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_ms: u64,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: default_database_path(),
            max_connections: 8,
            min_connections: 1,
            acquire_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersSection {
    /// Leading part of human-readable order numbers, e.g. `ORD-20260101-...`.
    pub number_prefix: String,
    pub max_items: usize,
    pub max_quantity: i32,
}

impl Default for OrdersSection {
    fn default() -> Self {
        OrdersSection {
            number_prefix: "ORD".to_string(),
            max_items: MAX_ORDER_ITEMS,
            max_quantity: MAX_ITEM_QUANTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
    /// Deadline applied to each service operation. 0 disables it.
    pub operation_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            bind_addr: "0.0.0.0:8080".to_string(),
            operation_timeout_ms: 10_000,
        }
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub database: DatabaseSection,
    pub hub: HubConfig,
    pub orders: OrdersSection,
    pub server: ServerSection,
}

impl ServiceConfig {
    /// Loads file, then environment overrides, then validates.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path
            .or_else(|| std::env::var("ORDERLINE_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!(?path, "Loading service config from file");
                Self::from_file(&path)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `ORDERLINE_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ORDERLINE_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(url) = lookup("ORDERLINE_REDIS_URL") {
            debug!("Overriding Redis URL from environment");
            self.hub.redis_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(channel) = lookup("ORDERLINE_EVENT_CHANNEL") {
            self.hub.channel = channel;
        }

        if let Some(addr) = lookup("ORDERLINE_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(ms) = lookup("ORDERLINE_OPERATION_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => self.server.operation_timeout_ms = ms,
                Err(_) => warn!(value = %ms, "Ignoring non-numeric ORDERLINE_OPERATION_TIMEOUT_MS"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(ConfigError::Invalid(format!(
                "database connections must satisfy 0 <= min ({}) <= max ({}), max >= 1",
                self.database.min_connections, self.database.max_connections
            )));
        }
        if self.orders.number_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("orders.number_prefix must not be empty".into()));
        }
        if self.orders.max_items == 0 || self.orders.max_quantity <= 0 {
            return Err(ConfigError::Invalid(
                "orders.max_items and orders.max_quantity must be positive".into(),
            ));
        }
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_addr must not be empty".into()));
        }
        self.hub.validate()?;
        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "orderline", "orderline")
            .map(|dirs| dirs.config_dir().join("service.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_millis(self.database.acquire_timeout_ms))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn order_limits(&self) -> OrderLimits {
        OrderLimits {
            max_items: self.orders.max_items,
            max_quantity: self.orders.max_quantity,
        }
    }

    /// Per-operation deadline, `None` when disabled.
    pub fn operation_timeout(&self) -> Option<Duration> {
        match self.server.operation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "orderline", "orderline")
        .map(|dirs| dirs.data_dir().join("orderline.db"))
        .unwrap_or_else(|| PathBuf::from("orderline.db"))
}
