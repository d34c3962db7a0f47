//! # Table Session Repository

use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::DbResult;
use orderline_core::TableSession;

/// Inserts a table session.
pub async fn insert(conn: &mut SqliteConnection, session: &TableSession) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO table_sessions (id, store_id, table_id, token, expires_at, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&session.id)
    .bind(&session.store_id)
    .bind(&session.table_id)
    .bind(&session.token)
    .bind(session.expires_at)
    .bind(session.is_active)
    .bind(session.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Gets a session by ID.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<TableSession>> {
    let session = sqlx::query_as::<_, TableSession>(
        r#"
        SELECT id, store_id, table_id, token, expires_at, is_active, created_at
        FROM table_sessions
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(session)
}

/// Gets a session by the token printed on the table's QR code.
pub async fn get_by_token(
    conn: &mut SqliteConnection,
    token: &str,
) -> DbResult<Option<TableSession>> {
    let session = sqlx::query_as::<_, TableSession>(
        r#"
        SELECT id, store_id, table_id, token, expires_at, is_active, created_at
        FROM table_sessions
        WHERE token = ?1
        "#,
    )
    .bind(token)
    .fetch_optional(conn)
    .await?;

    Ok(session)
}

/// Generates a new session ID.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates an unguessable 32-character hex token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let now = Utc::now();
        let session = TableSession {
            id: generate_session_id(),
            store_id: "s-1".to_string(),
            table_id: "t-1".to_string(),
            token: generate_token(),
            expires_at: now + Duration::hours(2),
            is_active: true,
            created_at: now,
        };
        insert(&mut conn, &session).await.unwrap();

        let by_id = get_by_id(&mut conn, &session.id).await.unwrap().unwrap();
        let by_token = get_by_token(&mut conn, &session.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.id, by_token.id);
        assert!(by_id.is_valid_at(now));
        assert!(!by_id.is_valid_at(now + Duration::hours(3)));

        assert!(get_by_token(&mut conn, "nope").await.unwrap().is_none());
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
