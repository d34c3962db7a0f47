//! # Audit Repository
//!
//! Append-only trail of state changes. Rows are written in the same
//! transaction as the change they describe and are never updated.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use orderline_core::AuditLogEntry;

/// Appends an audit entry.
pub async fn insert(conn: &mut SqliteConnection, entry: &AuditLogEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (
            id, user_id, action, entity, entity_id, before_state, after_state, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(entry.action)
    .bind(&entry.entity)
    .bind(&entry.entity_id)
    .bind(&entry.before_state)
    .bind(&entry.after_state)
    .bind(entry.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Lists the trail for one entity, oldest first.
pub async fn list_for_entity(
    conn: &mut SqliteConnection,
    entity: &str,
    entity_id: &str,
) -> DbResult<Vec<AuditLogEntry>> {
    let entries = sqlx::query_as::<_, AuditLogEntry>(
        r#"
        SELECT id, user_id, action, entity, entity_id, before_state, after_state, created_at
        FROM audit_logs
        WHERE entity = ?1 AND entity_id = ?2
        ORDER BY created_at, rowid
        "#,
    )
    .bind(entity)
    .bind(entity_id)
    .fetch_all(conn)
    .await?;

    Ok(entries)
}
