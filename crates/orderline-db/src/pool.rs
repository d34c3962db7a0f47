//! # Database Pool Management
//!
//! Connection pool creation, configuration, and the scoped-transaction
//! primitive every multi-row write goes through.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Service startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ──► Database::new(config) ──► migrations           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │  Reads:   db.acquire() ──► repository::order::get_by_id(&mut conn, ..)  │
//! │  Writes:  db.exec_tx(|conn| ...) ──► BEGIN IMMEDIATE ... COMMIT        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL mode is enabled so terminals reading orders never block a
//! cashier committing one.
//!
//! ## Write Locks
//! Write transactions take the write lock up front (`BEGIN IMMEDIATE`). A
//! deferred transaction that reads and then writes cannot be retried by
//! SQLite once another writer committed, and fails with `database is locked`
//! instead of waiting out `busy_timeout`.

use futures_util::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;

/// Path value that selects a private in-memory database.
const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/orderline/orderline.db")
///     .max_connections(8)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 8
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits for the SQLite write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 8,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an isolated in-memory database configuration (for testing).
    ///
    /// A single connection keeps the database alive for the pool's lifetime.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle. Cheap to clone (the pool is reference counted).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys on, busy timeout
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = if config.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", config.database_path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies all pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks out a connection for reads outside a transaction.
    pub async fn acquire(&self) -> DbResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Runs `f` inside one transaction.
    ///
    /// ## Guarantees
    /// ```text
    /// BEGIN IMMEDIATE (waits up to busy_timeout for the write lock)
    ///   f(conn) ──► Ok(v)  ──► COMMIT   ──► Ok(v)
    ///           └─► Err(e) ──► ROLLBACK ──► Err(e)
    ///
    /// future dropped mid-flight (cancellation, deadline, panic unwind)
    ///           ──► sqlx rolls the transaction back when it is dropped
    /// ```
    ///
    /// ## Example
    /// ```rust,ignore
    /// let order = db
    ///     .exec_tx(move |conn| Box::pin(async move {
    ///         repository::order::insert(conn, &order).await?;
    ///         Ok::<_, DbError>(order)
    ///     }))
    ///     .await?;
    /// ```
    ///
    /// The closure only gets the connection, so anything it needs must be
    /// moved in.
    pub async fn exec_tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send,
        E: From<DbError> + Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Closes the pool. Later operations fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn count_keys(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM idempotency_keys")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn insert_key(conn: &mut SqliteConnection, key: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO idempotency_keys (key, response_status, response_body, created_at)
             VALUES (?1, 201, '{}', '2026-01-01T00:00:00+00:00')",
        )
        .bind(key)
        .execute(conn)
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let a = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut conn = a.acquire().await.unwrap();
        insert_key(&mut conn, "only-in-a").await.unwrap();
        drop(conn);

        assert_eq!(count_keys(&a).await, 1);
        assert_eq!(count_keys(&b).await, 0);
    }

    #[tokio::test]
    async fn test_exec_tx_commits_on_ok() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let value = db
            .exec_tx(|conn| {
                Box::pin(async move {
                    insert_key(conn, "k1").await?;
                    insert_key(conn, "k2").await?;
                    Ok::<_, DbError>(2)
                })
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(count_keys(&db).await, 2);
    }

    #[tokio::test]
    async fn test_exec_tx_rolls_back_on_err() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let result = db
            .exec_tx(|conn| {
                Box::pin(async move {
                    insert_key(conn, "k1").await?;
                    // Same key again: unique violation aborts the whole unit.
                    insert_key(conn, "k1").await?;
                    Ok::<_, DbError>(())
                })
            })
            .await;

        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
        assert_eq!(count_keys(&db).await, 0);
    }

    #[tokio::test]
    async fn test_exec_tx_rolls_back_when_dropped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let pending = db.exec_tx(|conn| {
            Box::pin(async move {
                insert_key(conn, "k1").await?;
                std::future::pending::<()>().await;
                Ok::<_, DbError>(())
            })
        });

        let timed_out = tokio::time::timeout(Duration::from_millis(50), pending).await;
        assert!(timed_out.is_err());

        assert_eq!(count_keys(&db).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exec_tx_concurrent_read_then_write() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("orderline.db")))
            .await
            .unwrap();

        // Each writer reads before it writes, the shape of every order insert.
        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.exec_tx(move |conn| {
                    Box::pin(async move {
                        let seen: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM idempotency_keys")
                            .fetch_one(&mut *conn)
                            .await?;
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        insert_key(conn, &format!("k{i}")).await?;
                        Ok::<_, DbError>(seen)
                    })
                })
                .await
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap().unwrap());
        }
        seen.sort_unstable();

        assert_eq!(seen, (0..8).collect::<Vec<i64>>());
        assert_eq!(count_keys(&db).await, 8);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
