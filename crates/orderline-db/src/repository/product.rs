//! # Product Repository
//!
//! Read access to the catalog plus the stock decrement used by order
//! creation.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ❌ Read-then-write (oversells under concurrency)                   │
//! │     SELECT stock ... ; if stock >= qty { UPDATE ... }               │
//! │     Two cashiers both read stock = 5, both sell 4 → stock = -3      │
//! │                                                                     │
//! │  ✅ Conditional decrement (what we do)                              │
//! │     UPDATE products SET stock = stock - ?qty                        │
//! │     WHERE id = ? AND is_available = 1 AND stock >= ?qty             │
//! │     rows_affected = 0 → unavailable, the transaction rolls back     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use orderline_core::Product;

/// Inserts a product. Used by seeding and tests; the catalog is otherwise
/// managed outside the order path.
pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(sku = %product.sku, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, store_id, sku, name, price, stock, is_available, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&product.id)
    .bind(&product.store_id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(product.is_available)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Gets a product by its ID.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, store_id, sku, name, price, stock, is_available, created_at, updated_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

/// Counts the products in a store's catalog.
pub async fn count_for_store(conn: &mut SqliteConnection, store_id: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE store_id = ?1")
        .bind(store_id)
        .fetch_one(conn)
        .await?;

    Ok(count)
}

/// Atomically removes `qty` units from stock.
///
/// ## Returns
/// * `Ok(true)` - Stock decremented
/// * `Ok(false)` - Product missing, disabled, or short on stock; nothing changed
pub async fn decrement_stock(conn: &mut SqliteConnection, id: &str, qty: i32) -> DbResult<bool> {
    debug!(id = %id, qty = qty, "Decrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?2,
            updated_at = ?3
        WHERE id = ?1
          AND is_available = 1
          AND stock >= ?2
        "#,
    )
    .bind(id)
    .bind(qty)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
