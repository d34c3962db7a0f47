//! # Validation Module
//!
//! Request validation. Everything here runs before a transaction opens, so a
//! malformed request never touches the store.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Transport binding (deserialization into request types)       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (ids, quantities, amounts, keys)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (CHECK, UNIQUE, FOREIGN KEY, conditional UPDATE)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use orderline_core::validation::{validate_quantity, validate_idempotency_key};
//!
//! assert!(validate_quantity(2, 999).is_ok());
//! assert!(validate_quantity(0, 999).is_err());
//! assert_eq!(validate_idempotency_key("  retry-1 ").unwrap(), "retry-1");
//! ```

use crate::error::ValidationError;
use crate::types::CreateOrderRequest;
use crate::{MAX_IDEMPOTENCY_KEY_LEN, MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text note accepted on orders and items.
pub const MAX_NOTE_LEN: usize = 500;

/// Per-order limits, configurable per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLimits {
    pub max_items: usize,
    pub max_quantity: i32,
}

impl Default for OrderLimits {
    fn default() -> Self {
        OrderLimits {
            max_items: MAX_ORDER_ITEMS,
            max_quantity: MAX_ITEM_QUANTITY,
        }
    }
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates that `id` is a UUID.
///
/// ```rust
/// use orderline_core::validation::validate_uuid;
///
/// assert!(validate_uuid("store_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("store_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Trims and checks a client retry key.
pub fn validate_idempotency_key(key: &str) -> ValidationResult<String> {
    let key = key.trim();

    if key.is_empty() {
        return Err(ValidationError::Required {
            field: "idempotency_key".to_string(),
        });
    }

    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ValidationError::TooLong {
            field: "idempotency_key".to_string(),
            max: MAX_IDEMPOTENCY_KEY_LEN,
        });
    }

    Ok(key.to_string())
}

/// Checks an optional note against [`MAX_NOTE_LEN`].
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(text) if text.chars().count() > MAX_NOTE_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LEN,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: `1..=max`.
pub fn validate_quantity(qty: i32, max: i32) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: i64::from(max),
        });
    }

    Ok(())
}

/// Validates a counted drawer amount. Zero is allowed (empty float).
pub fn validate_cash_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a payment amount. Must be positive.
pub fn validate_payment_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a whole order creation request.
///
/// ## Rules
/// - `store_id`, optional `table_session_id`/`cashier_id` and every
///   `product_id` are UUIDs
/// - `items` is non-empty and at most `limits.max_items` long
/// - every quantity is in `1..=limits.max_quantity`
/// - notes fit [`MAX_NOTE_LEN`]
/// - an idempotency key, when present, passes [`validate_idempotency_key`]
pub fn validate_create_order(
    req: &CreateOrderRequest,
    limits: &OrderLimits,
) -> ValidationResult<()> {
    validate_uuid("store_id", &req.store_id)?;

    if let Some(session_id) = &req.table_session_id {
        validate_uuid("table_session_id", session_id)?;
    }
    if let Some(cashier_id) = &req.cashier_id {
        validate_uuid("cashier_id", cashier_id)?;
    }

    validate_note("note", req.note.as_deref())?;

    if req.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if req.items.len() > limits.max_items {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: limits.max_items as i64,
        });
    }

    for item in &req.items {
        validate_uuid("product_id", &item.product_id)?;
        validate_quantity(item.quantity, limits.max_quantity)?;
        validate_note("item note", item.note.as_deref())?;
    }

    if let Some(key) = &req.idempotency_key {
        validate_idempotency_key(key)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
