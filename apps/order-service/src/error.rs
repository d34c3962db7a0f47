//! # Service Error Types
//!
//! The error taxonomy callers see.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┬───────────┐
//! │ ErrorKind    │ Raised for                               │ Retry?    │
//! ├──────────────┼──────────────────────────────────────────┼───────────┤
//! │ Validation   │ malformed or out-of-range input          │ no        │
//! │ NotFound     │ order / product / shift / session absent │ no        │
//! │ Conflict     │ illegal transition, shift already open,  │ no        │
//! │              │ order already paid                       │           │
//! │ Unavailable  │ stock short, product disabled, deadline  │ yes       │
//! │              │ exceeded, request cancelled, store busy  │           │
//! │ Internal     │ store or transport failure, corrupt      │ yes       │
//! │              │ idempotency record                       │           │
//! └──────────────┴──────────────────────────────────────────┴───────────┘
//! ```

use orderline_core::{CoreError, ValidationError};
use orderline_db::repository::shift::USER_COLUMN;
use orderline_db::DbError;
use orderline_hub::HubError;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Broad category of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another request already recorded this idempotency key.
    #[error("Duplicate request for idempotency key {0}")]
    DuplicateRequest(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) | ServiceError::DuplicateRequest(_) => ErrorKind::Conflict,
            ServiceError::Unavailable(_) => ErrorKind::Unavailable,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Internal | ErrorKind::Unavailable)
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::ShiftNotFound(_)
            | CoreError::NoOpenShift(_)
            | CoreError::SessionNotFound => ServiceError::NotFound(message),

            CoreError::ProductUnavailable { .. } | CoreError::InsufficientStock { .. } => {
                ServiceError::Unavailable(message)
            }

            CoreError::InvalidTransition { .. }
            | CoreError::ShiftAlreadyOpen { .. }
            | CoreError::ShiftAlreadyClosed(_)
            | CoreError::PaymentRejected { .. } => ServiceError::Conflict(message),

            CoreError::CorruptIdempotencyRecord { .. } | CoreError::AmountOverflow(_) => {
                ServiceError::Internal(message)
            }

            CoreError::Validation(v) => ServiceError::Validation(v),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            DbError::UniqueViolation { .. } if err.is_unique_violation_on(USER_COLUMN) => {
                ServiceError::Conflict("User already has an active shift".to_string())
            }
            _ if err.is_transient() => ServiceError::Unavailable(err.to_string()),
            _ => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<HubError> for ServiceError {
    fn from(err: HubError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderline_core::OrderStatus;

    #[test]
    fn test_retryable_kinds() {
        assert!(ServiceError::Internal("db down".into()).is_retryable());
        assert!(ServiceError::Unavailable("out of stock".into()).is_retryable());

        assert!(!ServiceError::NotFound("order".into()).is_retryable());
        assert!(!ServiceError::Conflict("paid".into()).is_retryable());
        assert!(!ServiceError::DuplicateRequest("k".into()).is_retryable());
        let validation = ValidationError::Required {
            field: "items".into(),
        };
        assert!(!ServiceError::from(validation).is_retryable());
    }

    #[test]
    fn test_core_error_mapping() {
        let err = ServiceError::from(CoreError::InvalidTransition {
            from: OrderStatus::New,
            to: OrderStatus::Cooking,
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("NEW -> COOKING"));

        let err = ServiceError::from(CoreError::InsufficientStock {
            product_id: "p".into(),
            name: "Sate".into(),
            available: 5,
            requested: 10,
        });
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err = ServiceError::from(CoreError::CorruptIdempotencyRecord {
            key: "k".into(),
            reason: "eof".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(
            ServiceError::from(CoreError::SessionNotFound).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_db_error_mapping() {
        assert_eq!(
            ServiceError::from(DbError::not_found("Order", "o-1")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ServiceError::from(DbError::duplicate(USER_COLUMN, "u-1")).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ServiceError::from(DbError::duplicate("orders.order_number", "x")).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            ServiceError::from(DbError::QueryFailed("syntax".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_transient_db_errors_are_unavailable() {
        let busy = ServiceError::from(DbError::Busy("database is locked".into()));
        assert_eq!(busy.kind(), ErrorKind::Unavailable);
        assert!(busy.is_retryable());

        assert_eq!(
            ServiceError::from(DbError::PoolExhausted).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            ServiceError::from(DbError::CorruptRow("bad status".into())).kind(),
            ErrorKind::Internal
        );
    }
}
