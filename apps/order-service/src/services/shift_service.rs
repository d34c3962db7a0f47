//! # Shift Manager
//!
//! Cash-drawer shifts for cashiers.
//!
//! ```text
//! open_shift(user, store, opening_cash)
//!      │   one open shift per user (partial unique index)
//!      ▼
//!   ┌──────┐   CASH payments received_by = user, paid_at in [opened_at, now]
//!   │ OPEN │ ◄───────────────────────────────────────────────────────────────
//!   └──┬───┘
//!      │ close_shift(shift, closing_cash)
//!      ▼
//!   expected = opening_cash + cash_sales
//!   variance = closing_cash - expected          (+ over, - short)
//!   ┌────────┐
//!   │ CLOSED │   immutable afterwards
//!   └────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::info;

use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use orderline_core::validation::{validate_cash_amount, validate_uuid};
use orderline_core::{AuditAction, AuditLogEntry, CoreError, Money, Shift, ValidationError};
use orderline_db::repository::{audit, payment, shift};
use orderline_db::Database;

/// Reconciliation figures returned when a shift closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftReport {
    pub shift: Shift,
    pub cash_sales: Money,
    pub expected_cash: Money,
    pub variance: Money,
}

#[derive(Debug, Clone)]
pub struct ShiftManager {
    db: Database,
}

impl ShiftManager {
    pub fn new(db: Database) -> Self {
        ShiftManager { db }
    }

    /// Opens a shift. Fails with `Conflict` while the user has one open.
    pub async fn open_shift(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        store_id: &str,
        opening_cash: i64,
    ) -> ServiceResult<Shift> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "user_id".to_string(),
            }
            .into());
        }
        validate_uuid("store_id", store_id)?;
        validate_cash_amount("opening_cash", opening_cash)?;

        let opened = Shift {
            id: shift::generate_shift_id(),
            user_id: user_id.to_string(),
            store_id: store_id.to_string(),
            opened_at: Utc::now(),
            closed_at: None,
            opening_cash,
            closing_cash: None,
            expected_cash: None,
        };

        let opened = ctx
            .run(self.db.exec_tx(move |conn| Box::pin(insert_shift(conn, opened))))
            .await?;

        info!(
            shift_id = %opened.id,
            user_id = %opened.user_id,
            opening_cash = %Money::from_minor(opened.opening_cash),
            "Shift opened"
        );
        Ok(opened)
    }

    /// Closes a shift and reconciles the drawer against recorded cash sales.
    pub async fn close_shift(
        &self,
        ctx: &RequestContext,
        shift_id: &str,
        closing_cash: i64,
    ) -> ServiceResult<ShiftReport> {
        validate_uuid("shift_id", shift_id)?;
        validate_cash_amount("closing_cash", closing_cash)?;
        let id = shift_id.to_string();

        let report = ctx
            .run(
                self.db
                    .exec_tx(move |conn| Box::pin(reconcile(conn, id, closing_cash))),
            )
            .await?;

        info!(
            shift_id = %report.shift.id,
            expected = %report.expected_cash,
            counted = %Money::from_minor(closing_cash),
            variance = %report.variance,
            "Shift closed"
        );
        Ok(report)
    }

    /// The user's open shift. `NotFound` when there is none.
    pub async fn get_current_shift(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ServiceResult<Shift> {
        ctx.run(async {
            let mut conn = self.db.acquire().await?;
            let open = shift::get_open_for_user(&mut conn, user_id)
                .await?
                .ok_or_else(|| CoreError::NoOpenShift(user_id.to_string()))?;
            Ok(open)
        })
        .await
    }
}

async fn insert_shift(conn: &mut SqliteConnection, opened: Shift) -> ServiceResult<Shift> {
    shift::insert(conn, &opened).await.map_err(|e| {
        if e.is_unique_violation_on(shift::USER_COLUMN) {
            ServiceError::from(CoreError::ShiftAlreadyOpen {
                user_id: opened.user_id.clone(),
            })
        } else {
            e.into()
        }
    })?;

    let entry = AuditLogEntry::new(
        Some(&opened.user_id),
        AuditAction::ShiftOpened,
        "shift",
        &opened.id,
        None,
        Some(json!({ "opening_cash": opened.opening_cash, "store_id": opened.store_id })),
    );
    audit::insert(conn, &entry).await?;

    Ok(opened)
}

async fn reconcile(
    conn: &mut SqliteConnection,
    shift_id: String,
    closing_cash: i64,
) -> ServiceResult<ShiftReport> {
    let mut current = shift::get_by_id(conn, &shift_id)
        .await?
        .ok_or_else(|| CoreError::ShiftNotFound(shift_id.clone()))?;
    if !current.is_open() {
        return Err(CoreError::ShiftAlreadyClosed(shift_id).into());
    }

    let now = Utc::now();
    let cash_sales = Money::from_minor(
        payment::sum_cash_received(conn, &current.store_id, &current.user_id, current.opened_at, now)
            .await?,
    );
    let expected = Money::from_minor(current.opening_cash)
        .checked_add(cash_sales)
        .ok_or_else(|| CoreError::AmountOverflow(shift_id.clone()))?;

    if !shift::close(conn, &shift_id, now, closing_cash, expected.minor()).await? {
        return Err(CoreError::ShiftAlreadyClosed(shift_id).into());
    }

    current.closed_at = Some(now);
    current.closing_cash = Some(closing_cash);
    current.expected_cash = Some(expected.minor());
    let variance = Money::from_minor(closing_cash) - expected;

    let entry = AuditLogEntry::new(
        Some(&current.user_id),
        AuditAction::ShiftClosed,
        "shift",
        &current.id,
        Some(json!({ "opening_cash": current.opening_cash })),
        Some(json!({
            "closing_cash": closing_cash,
            "expected_cash": expected.minor(),
            "variance": variance.minor(),
        })),
    );
    audit::insert(conn, &entry).await?;

    Ok(ShiftReport {
        shift: current,
        cash_sales,
        expected_cash: expected,
        variance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::test_support::{file_harness, harness, Harness, CASHIER, STORE};
    use crate::services::order_service::{OrderProcessor, PaymentRequest};
    use orderline_core::validation::OrderLimits;
    use orderline_core::{CreateOrderRequest, OrderItemRequest, PaymentMethod};

    /// Places and settles a one-line order taken by `received_by`.
    async fn sell(h: &Harness, method: PaymentMethod, price: i64, received_by: &str) {
        let orders = OrderProcessor::new(h.db.clone(), h.hub.clone(), OrderLimits::default(), "ORD");
        let ctx = RequestContext::new();
        let p = h.product(price, 10).await;
        let created = orders
            .create_order(
                &ctx,
                CreateOrderRequest {
                    store_id: STORE.to_string(),
                    table_session_id: None,
                    cashier_id: None,
                    note: None,
                    items: vec![OrderItemRequest {
                        product_id: p.id,
                        quantity: 1,
                        note: None,
                    }],
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();
        orders
            .record_payment(
                &ctx,
                PaymentRequest {
                    order_id: created.id,
                    method,
                    amount: price,
                    reference_number: None,
                },
                received_by,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_open_shift_per_user() {
        let h = harness().await;
        let shifts = ShiftManager::new(h.db.clone());
        let ctx = RequestContext::new();

        let first = shifts.open_shift(&ctx, CASHIER, STORE, 100_000).await.unwrap();
        assert!(first.is_open());

        let err = shifts
            .open_shift(&ctx, CASHIER, STORE, 50_000)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        shifts.close_shift(&ctx, &first.id, 100_000).await.unwrap();
        let second = shifts.open_shift(&ctx, CASHIER, STORE, 50_000).await.unwrap();
        assert_ne!(first.id, second.id);

        let current = shifts.get_current_shift(&ctx, CASHIER).await.unwrap();
        assert_eq!(current.id, second.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_shift_admits_one() {
        let h = file_harness().await;
        let shifts = ShiftManager::new(h.db.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let shifts = shifts.clone();
            handles.push(tokio::spawn(async move {
                shifts
                    .open_shift(&RequestContext::new(), CASHIER, STORE, 10_000 * i)
                    .await
            }));
        }

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict, "{e}"),
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(h.count("shifts").await, 1);
    }

    #[tokio::test]
    async fn test_close_reconciles_cash_sales() {
        let h = harness().await;
        let shifts = ShiftManager::new(h.db.clone());
        let ctx = RequestContext::new();
        let opened = shifts.open_shift(&ctx, CASHIER, STORE, 100_000).await.unwrap();

        sell(&h, PaymentMethod::Cash, 30_000, CASHIER).await;
        sell(&h, PaymentMethod::Cash, 15_000, CASHIER).await;
        sell(&h, PaymentMethod::Qris, 99_000, CASHIER).await;
        sell(&h, PaymentMethod::Cash, 7_000, "someone-else").await;

        let report = shifts.close_shift(&ctx, &opened.id, 140_000).await.unwrap();
        assert_eq!(report.cash_sales.minor(), 45_000);
        assert_eq!(report.expected_cash.minor(), 145_000);
        assert_eq!(report.variance.minor(), -5_000);
        assert_eq!(report.shift.variance(), Some(report.variance));
        assert!(!report.shift.is_open());

        let err = shifts.get_current_shift(&ctx, CASHIER).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        // 4 payments, then open and close
        assert_eq!(h.count("audit_logs").await, 6);
    }

    #[tokio::test]
    async fn test_close_twice_and_unknown() {
        let h = harness().await;
        let shifts = ShiftManager::new(h.db.clone());
        let ctx = RequestContext::new();
        let opened = shifts.open_shift(&ctx, CASHIER, STORE, 0).await.unwrap();

        let report = shifts.close_shift(&ctx, &opened.id, 0).await.unwrap();
        assert!(report.variance.is_zero());

        let err = shifts.close_shift(&ctx, &opened.id, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let unknown = shift::generate_shift_id();
        let err = shifts.close_shift(&ctx, &unknown, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_validation() {
        let h = harness().await;
        let shifts = ShiftManager::new(h.db.clone());
        let ctx = RequestContext::new();

        for (user, store, cash) in [("", STORE, 0), (CASHIER, "store-1", 0), (CASHIER, STORE, -1)] {
            let err = shifts.open_shift(&ctx, user, store, cash).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(h.count("shifts").await, 0);
    }
}
