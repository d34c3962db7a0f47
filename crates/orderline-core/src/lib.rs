//! # orderline-core: Pure Business Logic for Orderline
//!
//! Everything here is deterministic and free of I/O: the entities persisted
//! by `orderline-db`, the money type used for every amount, input validation,
//! and the order fulfillment state machine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orderline Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                apps/order-service (processors)                  │   │
//! │  │   OrderProcessor • ShiftManager • SessionManager • Terminal WS  │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼────────────────────┐  │
//! │  │  orderline-db (SQLite)      │  │  orderline-hub (fan-out)        │  │
//! │  └──────────────┬──────────────┘  └────────────┬────────────────────┘  │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────────────────▼───────────────────┐   │
//! │  │              ★ orderline-core (THIS CRATE) ★                    │   │
//! │  │   types • money • state_machine • validation • event • error   │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Order, OrderItem, Shift, Payment, ...)
//! - [`money`] - Money type with integer arithmetic in minor units
//! - [`state_machine`] - Legal order status transitions
//! - [`event`] - Names of the real-time events sent to terminals
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation
//!
//! ## Example Usage
//!
//! ```rust
//! use orderline_core::money::Money;
//! use orderline_core::state_machine::is_valid_transition;
//! use orderline_core::OrderStatus;
//!
//! let price = Money::from_minor(15_000);
//! assert_eq!(price.checked_multiply_quantity(2).map(|m| m.minor()), Some(30_000));
//!
//! assert!(is_valid_transition(OrderStatus::New, OrderStatus::Accepted));
//! assert!(!is_valid_transition(OrderStatus::New, OrderStatus::Cooking));
//! ```

pub mod error;
pub mod event;
pub mod money;
pub mod state_machine;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use event::EventType;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default cap on line items per order.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Default cap on quantity for a single line item.
///
/// Catches typos like 1000 instead of 10 before they reach the kitchen.
pub const MAX_ITEM_QUANTITY: i32 = 999;

/// Longest idempotency key accepted from clients.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Lifetime of a table session token.
pub const TABLE_SESSION_TTL_HOURS: i64 = 2;
