//! # Error Types
//!
//! Domain-specific error types for orderline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  orderline-core (this file)                                            │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed or out-of-range input                │
//! │                                                                         │
//! │  orderline-db    └── DbError      - Store failures                     │
//! │  orderline-hub   └── HubError     - Broadcast transport failures       │
//! │  order-service   └── ServiceError - What callers see (kind + message)  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                   │
//! │        DbError ─────────────────────┼──► ServiceError { kind }          │
//! │        HubError (logged, swallowed)─┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the order and shift workflows.
#[derive(Debug, Error)]
pub enum CoreError {
    // =========================================================================
    // Missing entities
    // =========================================================================
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Shift not found: {0}")]
    ShiftNotFound(String),

    #[error("No open shift for user {0}")]
    NoOpenShift(String),

    #[error("Table session not found or expired")]
    SessionNotFound,

    // =========================================================================
    // Availability
    // =========================================================================
    /// Product is switched off in the catalog.
    #[error("Product {name} is not available")]
    ProductUnavailable { product_id: String, name: String },

    /// Not enough units on hand.
    ///
    /// ```text
    /// CreateOrder(qty: 10) ──► stock = 5 ──► InsufficientStock { available: 5, requested: 10 }
    /// ```
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i32,
        requested: i32,
    },

    // =========================================================================
    // Conflicts
    // =========================================================================
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("User {user_id} already has an active shift")]
    ShiftAlreadyOpen { user_id: String },

    #[error("Shift {0} is already closed")]
    ShiftAlreadyClosed(String),

    #[error("Order {order_id} cannot be paid: {reason}")]
    PaymentRejected { order_id: String, reason: String },

    // =========================================================================
    // Integrity
    // =========================================================================
    /// A stored idempotency response could not be decoded. Recreating the
    /// order would duplicate the side effect, so this is a hard failure.
    #[error("Idempotency record {key} is corrupt: {reason}")]
    CorruptIdempotencyRecord { key: String, reason: String },

    #[error("Amount overflow while pricing {0}")]
    AmountOverflow(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors. Raised before any transaction opens.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
