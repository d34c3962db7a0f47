//! # Order State Machine
//!
//! Pure validator for order status transitions.
//!
//! ## Transition Table
//! ```text
//! ┌──────────┬──────────────────────┐
//! │ current  │ allowed next         │
//! ├──────────┼──────────────────────┤
//! │ NEW      │ ACCEPTED, VOIDED     │
//! │ ACCEPTED │ COOKING, VOIDED      │
//! │ COOKING  │ READY, VOIDED        │
//! │ READY    │ DONE, VOIDED         │
//! │ DONE     │ (terminal)           │
//! │ VOIDED   │ (terminal)           │
//! └──────────┴──────────────────────┘
//! ```
//!
//! Every pair not listed is rejected, identity transitions included.

use crate::error::{CoreError, CoreResult};
use crate::types::OrderStatus;

/// Statuses reachable in one step from `current`.
pub const fn allowed_transitions(current: OrderStatus) -> &'static [OrderStatus] {
    match current {
        OrderStatus::New => &[OrderStatus::Accepted, OrderStatus::Voided],
        OrderStatus::Accepted => &[OrderStatus::Cooking, OrderStatus::Voided],
        OrderStatus::Cooking => &[OrderStatus::Ready, OrderStatus::Voided],
        OrderStatus::Ready => &[OrderStatus::Done, OrderStatus::Voided],
        OrderStatus::Done | OrderStatus::Voided => &[],
    }
}

/// Returns true when `current -> next` is a legal transition.
pub fn is_valid_transition(current: OrderStatus, next: OrderStatus) -> bool {
    allowed_transitions(current).contains(&next)
}

/// Like [`is_valid_transition`], but returns a `Conflict`-class error naming
/// both states.
pub fn validate_transition(current: OrderStatus, next: OrderStatus) -> CoreResult<()> {
    if is_valid_transition(current, next) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}
