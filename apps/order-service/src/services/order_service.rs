//! # Order Processor
//!
//! Creates orders, moves them through the fulfilment states, and records
//! payments.
//!
//! ## CreateOrder
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request                     Validation, before any I/O        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  IdempotencyGuard::lookup(key) ─hit─► stored order, no side effects     │
//! │       │ miss                                                            │
//! │       ▼                                                                 │
//! │  BEGIN ───────────────────────────────────────────────────────┐         │
//! │  │ for each line:                                             │         │
//! │  │   get product          NotFound                            │         │
//! │  │   disabled / short     Unavailable                         │         │
//! │  │   decrement stock      atomic, WHERE stock >= qty          │ any Err │
//! │  │   snapshot name+price, line total = price × qty            │ ──────► │
//! │  │ insert order (NEW, UNPAID) + items                         │ROLLBACK │
//! │  │ record idempotency key (same transaction)                  │         │
//! │  COMMIT ──────────────────────────────────────────────────────┘         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  publish NEW_ORDER   failures logged, never returned                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status updates and payments follow the same shape: one transaction for the
//! write and its audit entry, then an event after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::services::idempotency::{IdempotencyGuard, CREATED};
use orderline_core::state_machine::validate_transition;
use orderline_core::validation::{
    validate_create_order, validate_idempotency_key, validate_payment_amount, validate_uuid,
    OrderLimits,
};
use orderline_core::{
    AuditAction, AuditLogEntry, CoreError, CreateOrderRequest, EventType, Money, Order,
    OrderItem, OrderStatus, Payment, PaymentMethod, PaymentState, PaymentStatus, ValidationError,
};
use orderline_db::repository::{audit, order, payment, product, session};
use orderline_db::Database;
use orderline_hub::EventHub;

/// A payment against one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: String,
    pub method: PaymentMethod,
    /// Minor units. Must equal the order's final amount.
    pub amount: i64,
    #[serde(default)]
    pub reference_number: Option<String>,
}

pub struct OrderProcessor {
    db: Database,
    hub: Arc<EventHub>,
    guard: IdempotencyGuard,
    limits: OrderLimits,
    number_prefix: String,
}

impl OrderProcessor {
    pub fn new(
        db: Database,
        hub: Arc<EventHub>,
        limits: OrderLimits,
        number_prefix: impl Into<String>,
    ) -> Self {
        OrderProcessor {
            guard: IdempotencyGuard::new(db.clone()),
            db,
            hub,
            limits,
            number_prefix: number_prefix.into(),
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Validates, prices and persists a new order, then announces it.
    ///
    /// Retries carrying the same idempotency key get the first response back
    /// and cause no further writes or events.
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        mut req: CreateOrderRequest,
    ) -> ServiceResult<Order> {
        validate_create_order(&req, &self.limits)?;
        let key = req
            .idempotency_key
            .as_deref()
            .map(validate_idempotency_key)
            .transpose()?;
        req.idempotency_key = key.clone();

        ctx.run(self.create_order_inner(req, key)).await
    }

    async fn create_order_inner(
        &self,
        req: CreateOrderRequest,
        key: Option<String>,
    ) -> ServiceResult<Order> {
        if let Some(key) = &key {
            if let Some(order) = self.guard.lookup::<Order>(key).await? {
                info!(order_id = %order.id, key = %key, "Replaying idempotent create");
                return Ok(order);
            }
        }

        if let Some(session_id) = &req.table_session_id {
            self.check_session(&req.store_id, session_id).await?;
        }

        let prefix = self.number_prefix.clone();
        let tx_key = key.clone();
        let created = self
            .db
            .exec_tx(move |conn| Box::pin(insert_order(conn, req, tx_key, prefix)))
            .await;

        match created {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    items = order.items.len(),
                    total = %order.final_total(),
                    "Order created"
                );
                self.publish(EventType::NewOrder, &order).await;
                Ok(order)
            }
            Err(ServiceError::DuplicateRequest(key)) => {
                debug!(key = %key, "Lost idempotency race, replaying stored response");
                self.guard.lookup::<Order>(&key).await?.ok_or_else(|| {
                    ServiceError::Internal(format!("Idempotency record {key} missing after conflict"))
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn check_session(&self, store_id: &str, session_id: &str) -> ServiceResult<()> {
        let mut conn = self.db.acquire().await?;
        let valid = session::get_by_id(&mut conn, session_id)
            .await?
            .is_some_and(|s| s.store_id == store_id && s.is_valid_at(Utc::now()));

        if valid {
            Ok(())
        } else {
            Err(CoreError::SessionNotFound.into())
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves an order to `new_status` if the fulfilment flow allows it.
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        new_status: OrderStatus,
        acting_user_id: &str,
    ) -> ServiceResult<Order> {
        validate_uuid("order_id", order_id)?;
        let id = order_id.to_string();
        let actor = acting_user_id.to_string();

        let order = ctx
            .run(
                self.db
                    .exec_tx(move |conn| Box::pin(apply_status(conn, id, new_status, actor))),
            )
            .await?;

        info!(order_id = %order.id, status = %order.status, "Order status updated");
        self.publish(EventType::OrderStatusChanged, &order).await;
        Ok(order)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Settles an order in full.
    pub async fn record_payment(
        &self,
        ctx: &RequestContext,
        req: PaymentRequest,
        acting_user_id: &str,
    ) -> ServiceResult<Payment> {
        validate_uuid("order_id", &req.order_id)?;
        validate_payment_amount(req.amount)?;
        let actor = acting_user_id.to_string();

        let (paid, order) = ctx
            .run(
                self.db
                    .exec_tx(move |conn| Box::pin(apply_payment(conn, req, actor))),
            )
            .await?;

        info!(
            order_id = %order.id,
            payment_id = %paid.id,
            method = ?paid.method,
            amount = %Money::from_minor(paid.amount),
            "Payment recorded"
        );
        self.publish(EventType::OrderPaid, &order).await;
        Ok(paid)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_order(&self, ctx: &RequestContext, order_id: &str) -> ServiceResult<Order> {
        validate_uuid("order_id", order_id)?;

        ctx.run(async {
            let mut conn = self.db.acquire().await?;
            let found = order::get_by_id(&mut conn, order_id)
                .await?
                .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
            Ok(found)
        })
        .await
    }

    /// Orders placed in a table session, oldest first.
    pub async fn get_orders_by_session(
        &self,
        ctx: &RequestContext,
        session_id: &str,
    ) -> ServiceResult<Vec<Order>> {
        validate_uuid("table_session_id", session_id)?;

        ctx.run(async {
            let mut conn = self.db.acquire().await?;
            if session::get_by_id(&mut conn, session_id).await?.is_none() {
                return Err(ServiceError::from(CoreError::SessionNotFound));
            }
            Ok(order::list_by_session(&mut conn, session_id).await?)
        })
        .await
    }

    async fn publish(&self, event: EventType, order: &Order) {
        if let Err(e) = self.hub.publish(event, order).await {
            warn!(error = %e, event = %event, order_id = %order.id, "Event publish failed");
        }
    }
}

// =============================================================================
// Transaction Bodies
// =============================================================================

async fn insert_order(
    conn: &mut SqliteConnection,
    req: CreateOrderRequest,
    key: Option<String>,
    prefix: String,
) -> ServiceResult<Order> {
    let now = Utc::now();
    let order_id = order::generate_order_id();
    let mut items = Vec::with_capacity(req.items.len());
    let mut total = Money::zero();

    for line in &req.items {
        let item = product::get_by_id(conn, &line.product_id)
            .await?
            .filter(|p| p.store_id == req.store_id)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        if !item.is_available {
            return Err(CoreError::ProductUnavailable {
                product_id: item.id,
                name: item.name,
            }
            .into());
        }

        let short = CoreError::InsufficientStock {
            product_id: item.id.clone(),
            name: item.name.clone(),
            available: item.stock,
            requested: line.quantity,
        };
        if !item.can_fulfil(line.quantity) {
            return Err(short.into());
        }
        // Another order may have taken the stock since the read above.
        if !product::decrement_stock(conn, &item.id, line.quantity).await? {
            return Err(short.into());
        }

        let line_total = item
            .price()
            .checked_multiply_quantity(line.quantity)
            .ok_or_else(|| CoreError::AmountOverflow(item.name.clone()))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| CoreError::AmountOverflow(order_id.clone()))?;

        items.push(OrderItem {
            id: order::generate_item_id(),
            order_id: order_id.clone(),
            product_id: item.id,
            product_name: item.name,
            product_price: item.price,
            quantity: line.quantity,
            total_price: line_total.minor(),
            note: line.note.clone(),
            created_at: now,
        });
    }

    let created = Order {
        order_number: order_number(&prefix, now, &order_id),
        id: order_id,
        store_id: req.store_id,
        table_session_id: req.table_session_id,
        cashier_id: req.cashier_id,
        status: OrderStatus::New,
        payment_status: PaymentStatus::Unpaid,
        total_amount: total.minor(),
        tax_amount: 0,
        discount_amount: 0,
        final_amount: total.minor(),
        note: req.note,
        items,
        created_at: now,
        updated_at: now,
    };

    order::insert(conn, &created).await?;
    for item in &created.items {
        order::insert_item(conn, item).await?;
    }

    if let Some(key) = &key {
        IdempotencyGuard::record(conn, key, CREATED, &created).await?;
    }

    Ok(created)
}

async fn apply_status(
    conn: &mut SqliteConnection,
    order_id: String,
    to: OrderStatus,
    actor: String,
) -> ServiceResult<Order> {
    let mut current = order::get_by_id(conn, &order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_id.clone()))?;
    let from = current.status;

    validate_transition(from, to)?;

    let now = Utc::now();
    if !order::update_status(conn, &order_id, from, to, now).await? {
        return Err(ServiceError::Conflict(format!(
            "Order {order_id} changed while updating to {to}"
        )));
    }

    let entry = AuditLogEntry::new(
        Some(&actor),
        AuditAction::OrderStatusChanged,
        "order",
        &order_id,
        Some(json!({ "status": from })),
        Some(json!({ "status": to })),
    );
    audit::insert(conn, &entry).await?;

    current.status = to;
    current.updated_at = now;
    Ok(current)
}

async fn apply_payment(
    conn: &mut SqliteConnection,
    req: PaymentRequest,
    actor: String,
) -> ServiceResult<(Payment, Order)> {
    let mut current = order::get_by_id(conn, &req.order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(req.order_id.clone()))?;

    let rejected = |reason: &str| -> ServiceError {
        CoreError::PaymentRejected {
            order_id: req.order_id.clone(),
            reason: reason.to_string(),
        }
        .into()
    };

    if current.status == OrderStatus::Voided {
        return Err(rejected("order is voided"));
    }
    match current.payment_status {
        PaymentStatus::Unpaid => {}
        PaymentStatus::Paid => return Err(rejected("order is already paid")),
        PaymentStatus::Refunded => return Err(rejected("order was refunded")),
    }
    if req.amount != current.final_amount {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: current.final_amount,
            max: current.final_amount,
        }
        .into());
    }

    let now = Utc::now();
    let paid = Payment {
        id: payment::generate_payment_id(),
        order_id: current.id.clone(),
        store_id: current.store_id.clone(),
        method: req.method,
        amount: req.amount,
        status: PaymentState::Success,
        received_by: Some(actor.clone()),
        reference_number: req.reference_number.clone(),
        paid_at: Some(now),
        created_at: now,
    };
    payment::insert(conn, &paid).await?;

    if !order::update_payment_status(
        conn,
        &current.id,
        PaymentStatus::Unpaid,
        PaymentStatus::Paid,
        now,
    )
    .await?
    {
        return Err(rejected("order was paid concurrently"));
    }

    let entry = AuditLogEntry::new(
        Some(&actor),
        AuditAction::PaymentRecorded,
        "order",
        &current.id,
        Some(json!({ "payment_status": PaymentStatus::Unpaid })),
        Some(json!({
            "payment_status": PaymentStatus::Paid,
            "payment_id": paid.id,
            "method": paid.method,
            "amount": paid.amount,
        })),
    );
    audit::insert(conn, &entry).await?;

    current.payment_status = PaymentStatus::Paid;
    current.updated_at = now;
    Ok((paid, current))
}

/// `PREFIX-YYYYMMDD-XXXXXXXXXXXX`: readable date plus 48 random bits from the
/// order's UUID. The unique index on `order_number` backs it up.
fn order_number(prefix: &str, now: DateTime<Utc>, order_id: &str) -> String {
    let fragment: String = order_id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .skip(20)
        .take(12)
        .collect();
    format!(
        "{}-{}-{}",
        prefix,
        now.format("%Y%m%d"),
        fragment.to_ascii_uppercase()
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::test_support::{file_harness, harness, next_event, Harness, CASHIER, STORE};
    use std::sync::Arc;
    use chrono::Duration;
    use orderline_core::{OrderItemRequest, TableSession};
    use orderline_db::repository::idempotency;
    use orderline_core::IdempotencyRecord;

    fn processor(h: &Harness) -> OrderProcessor {
        OrderProcessor::new(h.db.clone(), h.hub.clone(), OrderLimits::default(), "ORD")
    }

    fn request(lines: &[(&str, i32)]) -> CreateOrderRequest {
        CreateOrderRequest {
            store_id: STORE.to_string(),
            table_session_id: None,
            cashier_id: Some(CASHIER.to_string()),
            note: None,
            items: lines
                .iter()
                .map(|(product_id, quantity)| OrderItemRequest {
                    product_id: product_id.to_string(),
                    quantity: *quantity,
                    note: None,
                })
                .collect(),
            idempotency_key: None,
        }
    }

    async fn open_session(h: &Harness, expires_in: Duration) -> TableSession {
        let now = Utc::now();
        let table_session = TableSession {
            id: session::generate_session_id(),
            store_id: STORE.to_string(),
            table_id: session::generate_session_id(),
            token: session::generate_token(),
            expires_at: now + expires_in,
            is_active: true,
            created_at: now,
        };
        let mut conn = h.db.acquire().await.unwrap();
        session::insert(&mut conn, &table_session).await.unwrap();
        table_session
    }

    // -------------------------------------------------------------------------
    // CreateOrder
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_prices_and_snapshots() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);

        let created = orders
            .create_order(&RequestContext::new(), request(&[(&p.id, 2)]))
            .await
            .unwrap();

        assert_eq!(created.total_amount, 30_000);
        assert_eq!(created.final_amount, 30_000);
        assert_eq!(created.status, OrderStatus::New);
        assert_eq!(created.payment_status, PaymentStatus::Unpaid);
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].product_price, 15_000);
        assert_eq!(created.items[0].total_price, 30_000);
        assert_eq!(created.items[0].product_name, "Sate Ayam");
        assert!(created.order_number.starts_with("ORD-"));
        assert_eq!(h.stock_of(&p.id).await, 3);

        let stored = orders
            .get_order(&RequestContext::new(), &created.id)
            .await
            .unwrap();
        assert_eq!(stored.items, created.items);
        assert_eq!(stored.order_number, created.order_number);
    }

    #[tokio::test]
    async fn test_total_is_sum_of_lines() {
        let h = harness().await;
        let a = h.product(15_000, 10).await;
        let b = h.product(4_500, 10).await;
        let c = h.product(999, 10).await;

        let created = processor(&h)
            .create_order(
                &RequestContext::new(),
                request(&[(&a.id, 1), (&b.id, 3), (&c.id, 7)]),
            )
            .await
            .unwrap();

        let sum: i64 = created.items.iter().map(|i| i.total_price).sum();
        assert_eq!(created.total_amount, sum);
        assert_eq!(created.total_amount, 15_000 + 13_500 + 6_993);
        for item in &created.items {
            assert_eq!(item.total_price, item.product_price * i64::from(item.quantity));
        }
    }

    #[tokio::test]
    async fn test_insufficient_stock_persists_nothing() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;

        let err = processor(&h)
            .create_order(&RequestContext::new(), request(&[(&p.id, 10)]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_retryable());
        assert_eq!(h.count("orders").await, 0);
        assert_eq!(h.count("order_items").await, 0);
        assert_eq!(h.stock_of(&p.id).await, 5);
    }

    #[tokio::test]
    async fn test_failure_on_later_line_rolls_back_earlier_lines() {
        let h = harness().await;
        let plenty = h.product(10_000, 50).await;
        let scarce = h.product(20_000, 1).await;

        let err = processor(&h)
            .create_order(
                &RequestContext::new(),
                request(&[(&plenty.id, 4), (&scarce.id, 2)]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(h.stock_of(&plenty.id).await, 50);
        assert_eq!(h.count("orders").await, 0);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_share_stock() {
        let h = harness().await;
        let p = h.product(1_000, 3).await;

        let err = processor(&h)
            .create_order(&RequestContext::new(), request(&[(&p.id, 2), (&p.id, 2)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(h.stock_of(&p.id).await, 3);
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_products() {
        let h = harness().await;
        let orders = processor(&h);

        let missing = uuid::Uuid::new_v4().to_string();
        let err = orders
            .create_order(&RequestContext::new(), request(&[(&missing, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let p = h.product(5_000, 10).await;
        sqlx::query("UPDATE products SET is_available = 0 WHERE id = ?1")
            .bind(&p.id)
            .execute(h.db.pool())
            .await
            .unwrap();
        let err = orders
            .create_order(&RequestContext::new(), request(&[(&p.id, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(h.count("orders").await, 0);
    }

    #[tokio::test]
    async fn test_product_from_another_store_is_not_found() {
        let h = harness().await;
        let orders = processor(&h);
        let local = h.product(5_000, 10).await;
        let foreign = h
            .product_in("6ba7b810-9dad-11d1-80b4-00c04fd430c8", 5_000, 10)
            .await;

        let err = orders
            .create_order(
                &RequestContext::new(),
                request(&[(&local.id, 1), (&foreign.id, 1)]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains(&foreign.id));
        assert_eq!(h.stock_of(&foreign.id).await, 10);
        assert_eq!(h.stock_of(&local.id).await, 10);
        assert_eq!(h.count("orders").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_requests_rejected_before_io() {
        let h = harness().await;
        let orders = processor(&h);

        let err = orders
            .create_order(&RequestContext::new(), request(&[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let p = h.product(5_000, 10).await;
        let err = orders
            .create_order(&RequestContext::new(), request(&[(&p.id, 0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());

        let mut blank_key = request(&[(&p.id, 1)]);
        blank_key.idempotency_key = Some("   ".into());
        let err = orders
            .create_order(&RequestContext::new(), blank_key)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.stock_of(&p.id).await, 10);
    }

    #[tokio::test]
    async fn test_create_publishes_new_order() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let mut terminal = h.terminal().await;

        let created = processor(&h)
            .create_order(&RequestContext::new(), request(&[(&p.id, 1)]))
            .await
            .unwrap();

        let event = next_event(&mut terminal.rx).await.unwrap();
        assert_eq!(event.event_type, EventType::NewOrder);
        assert_eq!(event.payload["id"], created.id.as_str());
        assert_eq!(event.payload["status"], "NEW");
        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancelled_request_writes_nothing() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let ctx = RequestContext::new();
        ctx.cancel();

        let err = processor(&h)
            .create_order(&ctx, request(&[(&p.id, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(h.count("orders").await, 0);
        assert_eq!(h.stock_of(&p.id).await, 5);
    }

    // -------------------------------------------------------------------------
    // Idempotency
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_same_key_returns_identical_response_once() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let mut terminal = h.terminal().await;

        let mut req = request(&[(&p.id, 2)]);
        req.idempotency_key = Some("checkout-42".into());

        let first = orders
            .create_order(&RequestContext::new(), req.clone())
            .await
            .unwrap();
        let second = orders
            .create_order(&RequestContext::new(), req)
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(h.count("orders").await, 1);
        assert_eq!(h.stock_of(&p.id).await, 3);

        assert!(next_event(&mut terminal.rx).await.is_some());
        assert!(next_event(&mut terminal.rx).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_key_creates_one_order() {
        let h = file_harness().await;
        let p = h.product(1_000, 10).await;
        let orders = Arc::new(processor(&h));

        let mut req = request(&[(&p.id, 1)]);
        req.idempotency_key = Some("tap-twice".into());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orders = orders.clone();
            let req = req.clone();
            handles.push(tokio::spawn(async move {
                orders.create_order(&RequestContext::new(), req).await
            }));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            let order = handle.await.unwrap().unwrap();
            bodies.push(serde_json::to_string(&order).unwrap());
        }

        assert!(bodies.iter().all(|b| b == &bodies[0]));
        assert_eq!(h.count("orders").await, 1);
        assert_eq!(h.count("idempotency_keys").await, 1);
        assert_eq!(h.stock_of(&p.id).await, 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let h = file_harness().await;
        let p = h.product(2_500, 5).await;
        let orders = Arc::new(processor(&h));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orders = orders.clone();
            let req = request(&[(&p.id, 1)]);
            handles.push(tokio::spawn(async move {
                orders.create_order(&RequestContext::new(), req).await
            }));
        }

        let mut created = 0;
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => {
                    assert_eq!(e.kind(), ErrorKind::Unavailable, "{e}");
                    assert!(!e.to_string().contains("locked"), "{e}");
                    sold_out += 1;
                }
            }
        }

        assert_eq!(created, 5);
        assert_eq!(sold_out, 3);
        assert_eq!(h.count("orders").await, 5);
        assert_eq!(h.stock_of(&p.id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_orders_all_commit() {
        let h = file_harness().await;
        let p = h.product(2_500, 100).await;
        let orders = Arc::new(processor(&h));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orders = orders.clone();
            let req = request(&[(&p.id, 2)]);
            handles.push(tokio::spawn(async move {
                orders.create_order(&RequestContext::new(), req).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(h.count("orders").await, 8);
        assert_eq!(h.count("order_items").await, 8);
        assert_eq!(h.stock_of(&p.id).await, 84);
    }

    #[tokio::test]
    async fn test_corrupt_stored_response_is_internal() {
        let h = harness().await;
        let p = h.product(1_000, 10).await;
        {
            let mut conn = h.db.acquire().await.unwrap();
            idempotency::insert(
                &mut conn,
                &IdempotencyRecord {
                    key: "broken".into(),
                    response_status: CREATED,
                    response_body: "{\"id\":".into(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }

        let mut req = request(&[(&p.id, 1)]);
        req.idempotency_key = Some("broken".into());
        let err = processor(&h)
            .create_order(&RequestContext::new(), req)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(h.count("orders").await, 0);
        assert_eq!(h.stock_of(&p.id).await, 10);
    }

    // -------------------------------------------------------------------------
    // Table sessions
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_orders_by_session() {
        let h = harness().await;
        let p = h.product(2_000, 10).await;
        let orders = processor(&h);
        let table = open_session(&h, Duration::hours(2)).await;

        let mut first = request(&[(&p.id, 1)]);
        first.table_session_id = Some(table.id.clone());
        let first = orders
            .create_order(&RequestContext::new(), first)
            .await
            .unwrap();

        let mut second = request(&[(&p.id, 2)]);
        second.table_session_id = Some(table.id.clone());
        let second = orders
            .create_order(&RequestContext::new(), second)
            .await
            .unwrap();

        orders
            .create_order(&RequestContext::new(), request(&[(&p.id, 1)]))
            .await
            .unwrap();

        let listed = orders
            .get_orders_by_session(&RequestContext::new(), &table.id)
            .await
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
        assert_eq!(listed[1].items[0].quantity, 2);

        let unknown = uuid::Uuid::new_v4().to_string();
        let err = orders
            .get_orders_by_session(&RequestContext::new(), &unknown)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let h = harness().await;
        let p = h.product(2_000, 10).await;
        let table = open_session(&h, Duration::seconds(-1)).await;

        let mut req = request(&[(&p.id, 1)]);
        req.table_session_id = Some(table.id);
        let err = processor(&h)
            .create_order(&RequestContext::new(), req)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(h.stock_of(&p.id).await, 10);
    }

    // -------------------------------------------------------------------------
    // UpdateStatus
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_full_fulfilment_flow_with_audit() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 1)])).await.unwrap();

        for next in [
            OrderStatus::Accepted,
            OrderStatus::Cooking,
            OrderStatus::Ready,
            OrderStatus::Done,
        ] {
            let updated = orders
                .update_status(&ctx, &created.id, next, CASHIER)
                .await
                .unwrap();
            assert_eq!(updated.status, next);
        }

        let mut conn = h.db.acquire().await.unwrap();
        let trail = audit::list_for_entity(&mut conn, "order", &created.id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 4);
        assert!(trail.iter().all(|e| e.action == AuditAction::OrderStatusChanged));
        assert_eq!(trail[0].user_id.as_deref(), Some(CASHIER));
        assert!(trail[0].before_state.as_deref().unwrap().contains("NEW"));
        assert!(trail[3].after_state.as_deref().unwrap().contains("DONE"));
    }

    #[tokio::test]
    async fn test_illegal_transition_is_conflict_and_unchanged() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 1)])).await.unwrap();

        let err = orders
            .update_status(&ctx, &created.id, OrderStatus::Cooking, CASHIER)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("NEW -> COOKING"));

        let stored = orders.get_order(&ctx, &created.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::New);
        assert_eq!(h.count("audit_logs").await, 0);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_everything() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 1)])).await.unwrap();

        orders
            .update_status(&ctx, &created.id, OrderStatus::Voided, CASHIER)
            .await
            .unwrap();

        for next in OrderStatus::ALL {
            let err = orders
                .update_status(&ctx, &created.id, next, CASHIER)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict, "VOIDED -> {next}");
        }
        let stored = orders.get_order(&ctx, &created.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Voided);
    }

    #[tokio::test]
    async fn test_update_unknown_order_is_not_found() {
        let h = harness().await;
        let unknown = uuid::Uuid::new_v4().to_string();
        let err = processor(&h)
            .update_status(&RequestContext::new(), &unknown, OrderStatus::Accepted, CASHIER)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = processor(&h)
            .get_order(&RequestContext::new(), &unknown)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_status_change_publishes_event() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 1)])).await.unwrap();

        let mut terminal = h.terminal().await;
        orders
            .update_status(&ctx, &created.id, OrderStatus::Accepted, CASHIER)
            .await
            .unwrap();

        let event = next_event(&mut terminal.rx).await.unwrap();
        assert_eq!(event.event_type, EventType::OrderStatusChanged);
        assert_eq!(event.payload["status"], "ACCEPTED");
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_payment_marks_order_paid_once() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 2)])).await.unwrap();
        let mut terminal = h.terminal().await;

        let pay = PaymentRequest {
            order_id: created.id.clone(),
            method: PaymentMethod::Cash,
            amount: 30_000,
            reference_number: None,
        };
        let paid = orders.record_payment(&ctx, pay.clone(), CASHIER).await.unwrap();
        assert_eq!(paid.status, PaymentState::Success);
        assert_eq!(paid.received_by.as_deref(), Some(CASHIER));
        assert!(paid.paid_at.is_some());

        let stored = orders.get_order(&ctx, &created.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);

        let event = next_event(&mut terminal.rx).await.unwrap();
        assert_eq!(event.event_type, EventType::OrderPaid);
        assert_eq!(event.payload["payment_status"], "PAID");

        let err = orders.record_payment(&ctx, pay, CASHIER).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(h.count("payments").await, 1);
    }

    #[tokio::test]
    async fn test_payment_amount_must_match() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 1)])).await.unwrap();

        let short = PaymentRequest {
            order_id: created.id.clone(),
            method: PaymentMethod::Qris,
            amount: 10_000,
            reference_number: Some("QR-1".into()),
        };
        let err = orders.record_payment(&ctx, short, CASHIER).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let zero = PaymentRequest {
            order_id: created.id.clone(),
            method: PaymentMethod::Cash,
            amount: 0,
            reference_number: None,
        };
        let err = orders.record_payment(&ctx, zero, CASHIER).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.count("payments").await, 0);
    }

    #[tokio::test]
    async fn test_voided_order_cannot_be_paid() {
        let h = harness().await;
        let p = h.product(15_000, 5).await;
        let orders = processor(&h);
        let ctx = RequestContext::new();
        let created = orders.create_order(&ctx, request(&[(&p.id, 1)])).await.unwrap();
        orders
            .update_status(&ctx, &created.id, OrderStatus::Voided, CASHIER)
            .await
            .unwrap();

        let pay = PaymentRequest {
            order_id: created.id.clone(),
            method: PaymentMethod::Cash,
            amount: 15_000,
            reference_number: None,
        };
        let err = orders.record_payment(&ctx, pay, CASHIER).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("voided"));
    }

    #[test]
    fn test_order_number_shape() {
        let now = Utc::now();
        let id = "550e8400-e29b-41d4-a716-446655440000";
        let number = order_number("ORD", now, id);
        assert_eq!(number, format!("ORD-{}-446655440000", now.format("%Y%m%d")));

        let a = order_number("ORD", now, &order::generate_order_id());
        let b = order_number("ORD", now, &order::generate_order_id());
        assert_ne!(a, b);
    }
}
