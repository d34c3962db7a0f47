//! # Orderline Order Service
//!
//! Composes the store, the event hub and the business processors.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Service                                   │
//! │                                                                         │
//! │   callers ──► OrderProcessor ──┬──► orderline-db (SQLite, exec_tx)      │
//! │               ShiftManager     │                                        │
//! │               SessionManager ──┘                                        │
//! │                    │                                                    │
//! │                    │ publish after commit                               │
//! │                    ▼                                                    │
//! │               EventHub ──► Redis / in-process channel ──► relay         │
//! │                                                            │            │
//! │   kitchen / cashier ◄── /ws/terminals ◄── per-terminal queue ◄┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - TOML + environment configuration
//! - [`context`] - Per-request deadline and cancellation
//! - [`error`] - Caller-facing error taxonomy
//! - [`services`] - OrderProcessor, ShiftManager, SessionManager, IdempotencyGuard
//! - [`terminal_ws`] - WebSocket endpoint for terminals

pub mod config;
pub mod context;
pub mod error;
pub mod services;
pub mod terminal_ws;

use std::sync::Arc;

use orderline_db::Database;
use orderline_hub::EventHub;

pub use config::{ConfigError, ServiceConfig};
pub use context::RequestContext;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use services::{OrderProcessor, PaymentRequest, SessionManager, ShiftManager, ShiftReport};

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    pub config: ServiceConfig,
    pub db: Database,
    pub hub: Arc<EventHub>,
    pub orders: OrderProcessor,
    pub shifts: ShiftManager,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: ServiceConfig, db: Database, hub: Arc<EventHub>) -> Self {
        let orders = OrderProcessor::new(
            db.clone(),
            hub.clone(),
            config.order_limits(),
            config.orders.number_prefix.clone(),
        );

        AppState {
            shifts: ShiftManager::new(db.clone()),
            sessions: SessionManager::new(db.clone()),
            orders,
            config,
            db,
            hub,
        }
    }

    /// A fresh context carrying the configured operation deadline.
    pub fn request_context(&self) -> RequestContext {
        match self.config.operation_timeout() {
            Some(timeout) => RequestContext::with_timeout(timeout),
            None => RequestContext::new(),
        }
    }
}
