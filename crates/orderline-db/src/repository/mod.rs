//! # Repository Module
//!
//! Per-entity SQL, one module per table family.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Connection-Scoped Repositories                       │
//! │                                                                         │
//! │  Every function takes `&mut SqliteConnection`, so the same call works  │
//! │  on a pooled connection (reads) and inside `Database::exec_tx`         │
//! │  (multi-row writes that must commit or roll back together).            │
//! │                                                                         │
//! │  db.exec_tx(|conn| Box::pin(async move {                                │
//! │      product::decrement_stock(conn, ..)   ─┐                            │
//! │      order::insert(conn, ..)               ├─ one transaction           │
//! │      order::insert_item(conn, ..)          │                            │
//! │      idempotency::insert(conn, ..)        ─┘                            │
//! │  }))                                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product`] - Product lookup and atomic stock decrement
//! - [`order`] - Orders and their line items
//! - [`payment`] - Payments and drawer cash totals
//! - [`shift`] - Cash-drawer shifts
//! - [`session`] - Table sessions
//! - [`idempotency`] - Cached responses for retried requests
//! - [`audit`] - Append-only audit trail

pub mod audit;
pub mod idempotency;
pub mod order;
pub mod payment;
pub mod product;
pub mod session;
pub mod shift;
