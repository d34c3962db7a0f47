//! # Idempotency Repository
//!
//! Stored responses keyed by client-supplied idempotency key.
//!
//! The key column is the primary key. When two requests with the same key
//! race, the second `insert` fails with
//! `DbError::UniqueViolation { field: "idempotency_keys.key", .. }` and its
//! transaction rolls back; the caller then reads the winner's record.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use orderline_core::IdempotencyRecord;

/// Column name SQLite reports when a key is recorded twice.
pub const KEY_COLUMN: &str = "idempotency_keys.key";

/// Looks up a stored response.
pub async fn get(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<IdempotencyRecord>> {
    let record = sqlx::query_as::<_, IdempotencyRecord>(
        r#"
        SELECT key, response_status, response_body, created_at
        FROM idempotency_keys
        WHERE key = ?1
        "#,
    )
    .bind(key)
    .fetch_optional(conn)
    .await?;

    Ok(record)
}

/// Records a response. Fails with a unique violation if the key exists.
pub async fn insert(conn: &mut SqliteConnection, record: &IdempotencyRecord) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO idempotency_keys (key, response_status, response_body, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&record.key)
    .bind(record.response_status)
    .bind(&record.response_body)
    .bind(record.created_at)
    .execute(conn)
    .await?;

    Ok(())
}
