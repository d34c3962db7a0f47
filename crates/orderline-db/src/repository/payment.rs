//! # Payment Repository
//!
//! Payments against orders, and the drawer total used when a shift closes.
//!
//! ## Drawer Total
//! ```text
//! expected_cash = opening_cash + sum_cash_received(store, user, opened_at, closed_at)
//!
//!   counts:   method = CASH, status = SUCCESS, received_by = user,
//!             store_id = store, opened_at <= paid_at <= closed_at
//!   ignores:  QRIS / PAY_LATER, failed or pending, other cashiers, other stores
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use orderline_core::{Payment, PaymentMethod, PaymentState};

/// Inserts a payment.
pub async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(order_id = %payment.order_id, method = ?payment.method, "Inserting payment");

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, order_id, store_id, method, amount, status, received_by,
            reference_number, paid_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(&payment.store_id)
    .bind(payment.method)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(&payment.received_by)
    .bind(&payment.reference_number)
    .bind(payment.paid_at)
    .bind(payment.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Sums successful cash payments a user took at a store within `[from, to]`.
pub async fn sum_cash_received(
    conn: &mut SqliteConnection,
    store_id: &str,
    user_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<i64> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM payments
        WHERE store_id = ?1
          AND received_by = ?2
          AND method = ?3
          AND status = ?4
          AND paid_at >= ?5
          AND paid_at <= ?6
        "#,
    )
    .bind(store_id)
    .bind(user_id)
    .bind(PaymentMethod::Cash)
    .bind(PaymentState::Success)
    .bind(from)
    .bind(to)
    .fetch_one(conn)
    .await?;

    Ok(total)
}

/// Generates a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}
