//! # orderline-db: Database Layer for Orderline
//!
//! SQLite persistence for orders, stock, payments, shifts, table sessions,
//! idempotency records and the audit trail, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orderline Data Flow                              │
//! │                                                                         │
//! │  OrderProcessor / ShiftManager (order-service)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   orderline-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  repository:: │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ product       │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ order         │    │   _schema    │  │   │
//! │  │   │ exec_tx       │    │ payment shift │    │              │  │   │
//! │  │   │               │    │ session ...   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and scoped transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Per-entity SQL
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orderline_db::{repository, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("orderline.db")).await?;
//!
//! let mut conn = db.acquire().await?;
//! let order = repository::order::get_by_id(&mut conn, &order_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
