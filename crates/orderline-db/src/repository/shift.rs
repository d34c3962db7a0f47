//! # Shift Repository
//!
//! Cash-drawer shifts. One open shift per user is enforced by the partial
//! unique index `idx_shifts_one_open_per_user`, so a concurrent second
//! `insert` fails with a unique violation on [`USER_COLUMN`].

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use orderline_core::Shift;

/// Column name SQLite reports when a user already has an open shift.
pub const USER_COLUMN: &str = "shifts.user_id";

/// Inserts a new (open) shift.
pub async fn insert(conn: &mut SqliteConnection, shift: &Shift) -> DbResult<()> {
    debug!(user_id = %shift.user_id, "Opening shift");

    sqlx::query(
        r#"
        INSERT INTO shifts (
            id, user_id, store_id, opened_at, closed_at, opening_cash, closing_cash, expected_cash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&shift.id)
    .bind(&shift.user_id)
    .bind(&shift.store_id)
    .bind(shift.opened_at)
    .bind(shift.closed_at)
    .bind(shift.opening_cash)
    .bind(shift.closing_cash)
    .bind(shift.expected_cash)
    .execute(conn)
    .await?;

    Ok(())
}

/// Gets a shift by ID.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, user_id, store_id, opened_at, closed_at, opening_cash, closing_cash, expected_cash
        FROM shifts
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(shift)
}

/// Gets the user's open shift, if any.
pub async fn get_open_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> DbResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, user_id, store_id, opened_at, closed_at, opening_cash, closing_cash, expected_cash
        FROM shifts
        WHERE user_id = ?1 AND closed_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(shift)
}

/// Closes a shift, recording the counted and expected cash.
///
/// ## Returns
/// * `Ok(true)` - Shift closed
/// * `Ok(false)` - Shift missing or already closed
pub async fn close(
    conn: &mut SqliteConnection,
    id: &str,
    closed_at: DateTime<Utc>,
    closing_cash: i64,
    expected_cash: i64,
) -> DbResult<bool> {
    debug!(id = %id, closing_cash, expected_cash, "Closing shift");

    let result = sqlx::query(
        r#"
        UPDATE shifts
        SET closed_at = ?2,
            closing_cash = ?3,
            expected_cash = ?4
        WHERE id = ?1 AND closed_at IS NULL
        "#,
    )
    .bind(id)
    .bind(closed_at)
    .bind(closing_cash)
    .bind(expected_cash)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Generates a new shift ID.
pub fn generate_shift_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    const STORE: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn open_shift(user_id: &str, opening_cash: i64) -> Shift {
        Shift {
            id: generate_shift_id(),
            user_id: user_id.to_string(),
            store_id: STORE.to_string(),
            opened_at: Utc::now(),
            closed_at: None,
            opening_cash,
            closing_cash: None,
            expected_cash: None,
        }
    }

    #[tokio::test]
    async fn test_one_open_shift_per_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let first = open_shift("u-1", 100_000);
        insert(&mut conn, &first).await.unwrap();

        let err = insert(&mut conn, &open_shift("u-1", 50_000))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on(USER_COLUMN));

        // Other users are unaffected.
        insert(&mut conn, &open_shift("u-2", 0)).await.unwrap();

        // Once closed, the user may open again.
        assert!(close(&mut conn, &first.id, Utc::now(), 100_000, 100_000)
            .await
            .unwrap());
        insert(&mut conn, &open_shift("u-1", 10_000)).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_and_reload() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let shift = open_shift("u-1", 100_000);
        insert(&mut conn, &shift).await.unwrap();

        let open = get_open_for_user(&mut conn, "u-1").await.unwrap().unwrap();
        assert_eq!(open.id, shift.id);
        assert!(open.is_open());

        assert!(close(&mut conn, &shift.id, Utc::now(), 140_000, 150_000)
            .await
            .unwrap());
        // Second close is a no-op.
        assert!(!close(&mut conn, &shift.id, Utc::now(), 1, 1).await.unwrap());

        let closed = get_by_id(&mut conn, &shift.id).await.unwrap().unwrap();
        assert!(!closed.is_open());
        assert_eq!(closed.closing_cash, Some(140_000));
        assert_eq!(closed.expected_cash, Some(150_000));
        assert_eq!(closed.variance().unwrap().minor(), -10_000);

        assert!(get_open_for_user(&mut conn, "u-1").await.unwrap().is_none());
    }
}
