//! Real-time event names pushed to terminals.
//!
//! On the wire every event is `{"type": <name>, "payload": <entity>}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum EventType {
    /// A new order was committed. Payload: the order.
    NewOrder,
    /// An order moved through the fulfillment flow. Payload: the order.
    OrderStatusChanged,
    /// An order was settled. Payload: the order.
    OrderPaid,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::NewOrder => "NEW_ORDER",
            EventType::OrderStatusChanged => "ORDER_STATUS_CHANGED",
            EventType::OrderPaid => "ORDER_PAID",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
