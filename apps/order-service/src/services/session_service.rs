//! # Session Manager
//!
//! Dine-in table sessions. A session is opened when guests sit down and its
//! token is printed on the table's QR code; orders placed from the table
//! carry the session id.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::info;

use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use orderline_core::validation::validate_uuid;
use orderline_core::{CoreError, TableSession, ValidationError, TABLE_SESSION_TTL_HOURS};
use orderline_db::repository::session;
use orderline_db::Database;

#[derive(Debug, Clone)]
pub struct SessionManager {
    db: Database,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Database) -> Self {
        SessionManager {
            db,
            ttl: Duration::hours(TABLE_SESSION_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: StdDuration) -> Self {
        self.ttl = Duration::from_std(ttl).unwrap_or(self.ttl);
        self
    }

    /// Opens a session for a table with a fresh random token.
    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        store_id: &str,
        table_id: &str,
    ) -> ServiceResult<TableSession> {
        validate_uuid("store_id", store_id)?;
        if table_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "table_id".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let opened = TableSession {
            id: session::generate_session_id(),
            store_id: store_id.to_string(),
            table_id: table_id.to_string(),
            token: session::generate_token(),
            expires_at: now + self.ttl,
            is_active: true,
            created_at: now,
        };

        ctx.run(async {
            let mut conn = self.db.acquire().await?;
            session::insert(&mut conn, &opened).await?;
            Ok(())
        })
        .await?;

        info!(
            session_id = %opened.id,
            table_id = %opened.table_id,
            expires_at = %opened.expires_at,
            "Table session opened"
        );
        Ok(opened)
    }

    /// Resolves a QR token to its live session.
    ///
    /// Unknown, expired and inactive tokens are all `NotFound` so a caller
    /// cannot tell them apart.
    pub async fn validate_session(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> ServiceResult<TableSession> {
        ctx.run(async {
            let mut conn = self.db.acquire().await?;
            let found = session::get_by_token(&mut conn, token.trim()).await?;
            match found {
                Some(s) if s.is_valid_at(Utc::now()) => Ok(s),
                _ => Err(ServiceError::from(CoreError::SessionNotFound)),
            }
        })
        .await
    }
}
