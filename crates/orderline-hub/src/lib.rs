//! # orderline-hub: Real-time Event Hub for Orderline
//!
//! Fans order events out to connected terminals on every service instance.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Event Delivery                                  │
//! │                                                                         │
//! │  ┌────────────────┐  publish   ┌────────────────────┐                   │
//! │  │ OrderProcessor │ ─────────► │ BroadcastTransport │  Redis / memory   │
//! │  └────────────────┘            └─────────┬──────────┘                   │
//! │                                          │ subscribe                    │
//! │                                          ▼                              │
//! │                                ┌────────────────────┐                   │
//! │                                │   EventHub relay   │                   │
//! │                                └─────────┬──────────┘                   │
//! │                          ┌───────────────┼───────────────┐              │
//! │                          ▼               ▼               ▼              │
//! │                      kitchen-1       kitchen-2       cashier-1          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`hub`] - Terminal registry, fan-out and relay
//! - [`transport`] - `BroadcastTransport` with Redis and in-process backends
//! - [`protocol`] - `{type, payload}` envelope
//! - [`config`] - `[hub]` configuration section
//! - [`error`] - Hub error types

pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod transport;

pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use hub::{EventHub, Registration, RelayHandle, TerminalId};
pub use protocol::{Envelope, RawEnvelope};
pub use transport::{BroadcastTransport, MemoryTransport, RedisTransport};
