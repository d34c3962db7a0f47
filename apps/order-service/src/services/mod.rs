//! # Services
//!
//! Business workflows on top of the store and the event hub.
//!
//! - [`order_service`] - `OrderProcessor`: create, status updates, payments, reads
//! - [`shift_service`] - `ShiftManager`: cash-drawer shifts and reconciliation
//! - [`session_service`] - `SessionManager`: table sessions for dine-in orders
//! - [`idempotency`] - `IdempotencyGuard`: dedup of retried creates

pub mod idempotency;
pub mod order_service;
pub mod session_service;
pub mod shift_service;

pub use idempotency::IdempotencyGuard;
pub use order_service::{OrderProcessor, PaymentRequest};
pub use session_service::SessionManager;
pub use shift_service::{ShiftManager, ShiftReport};
