//! # Order Repository
//!
//! Orders and their line items.
//!
//! ## Write Path
//! ```text
//! CreateOrder (inside exec_tx)
//!      │
//!      ├── insert(order)          orders row, status NEW, payment UNPAID
//!      ├── insert_item(item) × N  snapshot of name and price at order time
//!      │
//!      ▼
//! COMMIT  (or ROLLBACK: no order, no items, no stock change)
//! ```
//!
//! Items are never updated after insert. Prices on an item are the prices the
//! customer saw, even if the catalog changes later.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use orderline_core::{Order, OrderItem, OrderStatus, PaymentStatus};

const ORDER_COLUMNS: &str = "id, store_id, table_session_id, cashier_id, order_number, status, \
     payment_status, total_amount, tax_amount, discount_amount, final_amount, note, \
     created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, product_price, quantity, \
     total_price, note, created_at";

// =============================================================================
// Writes
// =============================================================================

/// Inserts the order header row. Items are inserted separately.
pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(order_number = %order.order_number, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, store_id, table_session_id, cashier_id, order_number, status,
            payment_status, total_amount, tax_amount, discount_amount, final_amount,
            note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&order.id)
    .bind(&order.store_id)
    .bind(&order.table_session_id)
    .bind(&order.cashier_id)
    .bind(&order.order_number)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.total_amount)
    .bind(order.tax_amount)
    .bind(order.discount_amount)
    .bind(order.final_amount)
    .bind(&order.note)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Inserts one line item.
pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, product_name, product_price, quantity,
            total_price, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(item.product_price)
    .bind(item.quantity)
    .bind(item.total_price)
    .bind(&item.note)
    .bind(item.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Moves an order from `from` to `to`.
///
/// The current status is part of the WHERE clause, so two concurrent updates
/// that both validated against the same `from` cannot both apply.
///
/// ## Returns
/// * `Ok(true)` - Row updated
/// * `Ok(false)` - Order missing, or its status is no longer `from`
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id = %id, from = %from, to = %to, "Updating order status");

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?3,
            updated_at = ?4
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Sets the payment status, guarded on the current one.
pub async fn update_payment_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = ?3,
            updated_at = ?4
        WHERE id = ?1 AND payment_status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Reads
// =============================================================================

/// Gets an order with its items.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match order {
        Some(mut order) => {
            order.items = get_items(conn, &order.id).await?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

/// Gets the items of an order in insertion order.
pub async fn get_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY created_at, rowid"
    );
    let items = sqlx::query_as::<_, OrderItem>(&sql)
        .bind(order_id)
        .fetch_all(conn)
        .await?;

    Ok(items)
}

/// Lists the orders placed in a table session, oldest first, with items.
pub async fn list_by_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<Vec<Order>> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE table_session_id = ?1 \
         ORDER BY created_at, rowid"
    );
    let mut orders = sqlx::query_as::<_, Order>(&sql)
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

    for order in &mut orders {
        order.items = get_items(&mut *conn, &order.id).await?;
    }

    Ok(orders)
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new order item ID.
pub fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}
