//! # Idempotency Guard
//!
//! At most one side effect per client key, and the same response for every
//! retry with that key.
//!
//! ```text
//! request(key)
//!    │
//!    ├── lookup(key) ── hit ──► decode stored body ──► return it (no side effect)
//!    │                    └── undecodable ──► Internal (never re-run)
//!    │
//!    └── miss ──► BEGIN
//!                   side effect
//!                   record(conn, key, response)   same transaction
//!                 COMMIT
//!
//! Two racing requests both miss: the second `record` hits the primary key,
//! its transaction rolls back, and it is answered from the winner's record.
//! ```

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use orderline_core::{CoreError, IdempotencyRecord};
use orderline_db::repository::idempotency;
use orderline_db::Database;

/// Status stored alongside a successful create.
pub const CREATED: i32 = 201;

#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    db: Database,
}

impl IdempotencyGuard {
    pub fn new(db: Database) -> Self {
        IdempotencyGuard { db }
    }

    /// Returns the stored response for `key`, if one exists.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> ServiceResult<Option<T>> {
        let mut conn = self.db.acquire().await?;
        let Some(record) = idempotency::get(&mut conn, key).await? else {
            return Ok(None);
        };

        debug!(key = %key, status = record.response_status, "Idempotency hit");
        decode(&record).map(Some)
    }

    /// Records `response` for `key` on the caller's transaction.
    ///
    /// Fails with [`ServiceError::DuplicateRequest`] when the key is already
    /// taken, which rolls the caller's transaction back.
    pub async fn record<T: Serialize>(
        conn: &mut SqliteConnection,
        key: &str,
        status: i32,
        response: &T,
    ) -> ServiceResult<()> {
        let record = IdempotencyRecord {
            key: key.to_string(),
            response_status: status,
            response_body: serde_json::to_string(response)?,
            created_at: Utc::now(),
        };

        idempotency::insert(conn, &record).await.map_err(|e| {
            if e.is_unique_violation_on(idempotency::KEY_COLUMN) {
                ServiceError::DuplicateRequest(key.to_string())
            } else {
                e.into()
            }
        })
    }
}

fn decode<T: DeserializeOwned>(record: &IdempotencyRecord) -> ServiceResult<T> {
    serde_json::from_str(&record.response_body).map_err(|e| {
        CoreError::CorruptIdempotencyRecord {
            key: record.key.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}
