//! # Domain Types
//!
//! Entities shared by the store, the processors and the terminals.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Entity Relationships                            │
//! │                                                                         │
//! │  TableSession 1 ──── * Order 1 ──── * OrderItem ····► Product           │
//! │                          │              (snapshot of name + price)      │
//! │                          │                                              │
//! │                          └── 1 ──── * Payment ····► Shift (by cashier,  │
//! │                                                    store and window)   │
//! │                                                                         │
//! │  Independent logs:  IdempotencyRecord (by key)                         │
//! │                     AuditLogEntry     (append-only)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! An [`OrderItem`] copies the product name and price at order time. Editing
//! or deleting the product afterwards never changes a past order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A sellable product as seen by the order path.
///
/// The catalog itself is managed elsewhere; orders only read it and
/// decrement `stock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub sku: String,
    pub name: String,
    /// Unit price in minor units.
    pub price: i64,
    pub stock: i32,
    pub is_available: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price)
    }

    /// True when the product is enabled and `qty` units are on hand.
    pub fn can_fulfil(&self, qty: i32) -> bool {
        self.is_available && self.stock >= qty
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfillment status of an order.
///
/// ```text
///   NEW ──► ACCEPTED ──► COOKING ──► READY ──► DONE
///    │          │            │          │
///    └──────────┴────────────┴──────────┴────► VOIDED
/// ```
///
/// See [`crate::state_machine`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum OrderStatus {
    New,
    Accepted,
    Cooking,
    Ready,
    Done,
    Voided,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::Accepted,
        OrderStatus::Cooking,
        OrderStatus::Ready,
        OrderStatus::Done,
        OrderStatus::Voided,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Cooking => "COOKING",
            OrderStatus::Ready => "READY",
            OrderStatus::Done => "DONE",
            OrderStatus::Voided => "VOIDED",
        }
    }

    /// DONE and VOIDED accept no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Voided)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|s| s.to_string()).collect(),
            })
    }
}

// =============================================================================
// Payment Enums
// =============================================================================

/// Whether an order has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentMethod {
    /// Physical cash into the drawer. Counts toward shift reconciliation.
    Cash,
    /// QR code bank transfer.
    Qris,
    /// Settled later (tab, invoice).
    PayLater,
}

/// Outcome of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentState {
    Pending,
    Success,
    Failed,
}

// =============================================================================
// Order
// =============================================================================

/// An order header with its line items.
///
/// ## Amount Invariant
/// `final_amount = total_amount + tax_amount - discount_amount` at creation.
/// Only the status fields change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub store_id: String,
    pub table_session_id: Option<String>,
    pub cashier_id: Option<String>,
    /// Human-readable number printed on tickets, e.g. `ORD-20261019-4F1A9C2B`.
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: i64,
    pub tax_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    pub note: Option<String>,
    /// Loaded separately from `order_items`.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<OrderItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_amount)
    }

    #[inline]
    pub fn final_total(&self) -> Money {
        Money::from_minor(self.final_amount)
    }
}

/// A line item, frozen at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at order time.
    pub product_name: String,
    /// Unit price at order time, minor units.
    pub product_price: i64,
    pub quantity: i32,
    /// `product_price × quantity`.
    pub total_price: i64,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_minor(self.total_price)
    }
}

// =============================================================================
// Order Requests
// =============================================================================

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub note: Option<String>,
}

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateOrderRequest {
    pub store_id: String,
    #[serde(default)]
    pub table_session_id: Option<String>,
    /// Acting cashier, when the order is keyed in at the counter.
    #[serde(default)]
    pub cashier_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub items: Vec<OrderItemRequest>,
    /// Client-supplied retry key.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

// =============================================================================
// Payment
// =============================================================================

/// A tender recorded against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub store_id: String,
    pub method: PaymentMethod,
    pub amount: i64,
    pub status: PaymentState,
    /// User who took the payment; ties cash to a drawer shift.
    pub received_by: Option<String>,
    pub reference_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shift
// =============================================================================

/// A cashier's cash-drawer session.
///
/// ## Lifecycle
/// ```text
/// OpenShift(opening_cash) ──► [open: closed_at = NULL] ──► CloseShift(closing_cash)
///                                                              │
///              expected_cash = opening_cash + Σ CASH payments  │
///              variance      = closing_cash − expected_cash  ◄─┘
/// ```
///
/// At most one open shift per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub store_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_cash: i64,
    pub closing_cash: Option<i64>,
    pub expected_cash: Option<i64>,
}

impl Shift {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Over (positive) or short (negative) against the expected drawer.
    /// `None` until the shift is closed.
    pub fn variance(&self) -> Option<Money> {
        match (self.closing_cash, self.expected_cash) {
            (Some(closing), Some(expected)) => {
                Some(Money::from_minor(closing) - Money::from_minor(expected))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Table Session
// =============================================================================

/// A dine-in table's ordering session, identified by a QR token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TableSession {
    pub id: String,
    pub store_id: String,
    pub table_id: String,
    pub token: String,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TableSession {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }
}

// =============================================================================
// Idempotency Record
// =============================================================================

/// Cached response for a client retry key. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct IdempotencyRecord {
    pub key: String,
    /// Status code returned to the caller for the original request.
    pub response_status: i32,
    /// Serialized response body.
    pub response_body: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// What happened, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OrderStatusChanged,
    PaymentRecorded,
    ShiftOpened,
    ShiftClosed,
}

/// Append-only audit trail entry.
///
/// `before_state` and `after_state` hold JSON snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub action: AuditAction,
    /// Entity kind, e.g. `order` or `shift`.
    pub entity: String,
    pub entity_id: Option<String>,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Builds a new entry stamped now.
    pub fn new(
        user_id: Option<&str>,
        action: AuditAction,
        entity: &str,
        entity_id: &str,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            action,
            entity: entity.to_string(),
            entity_id: Some(entity_id.to_string()),
            before_state: before.map(|v| v.to_string()),
            after_state: after.map(|v| v.to_string()),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Terminals
// =============================================================================

/// Kind of real-time client attached to the event hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum TerminalKind {
    Kitchen,
    Cashier,
}

// =============================================================================
// Unit Tests
// =============================================================================
