//! # Event Envelope
//!
//! Wire format for everything on the broadcast channel and every frame sent
//! to a terminal.
//!
//! ```json
//! { "type": "NEW_ORDER", "payload": { "id": "...", "store_id": "...", ... } }
//! ```
//!
//! There is no version field; readers ignore unknown payload fields. The
//! relay routes on [`RawEnvelope`], which keeps the type as a plain string,
//! so event types added by newer publishers still reach terminals.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HubError, HubResult};
use orderline_core::EventType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: Value,
}

impl Envelope {
    /// Wraps any serializable entity.
    pub fn new<T: Serialize>(event_type: EventType, payload: &T) -> HubResult<Self> {
        Ok(Envelope {
            event_type,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn to_bytes(&self) -> HubResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> HubResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| HubError::InvalidEnvelope(e.to_string()))
    }

    /// Store the payload belongs to, when it names one.
    pub fn store_id(&self) -> Option<&str> {
        self.payload.get("store_id").and_then(Value::as_str)
    }
}

/// Envelope with the event type left undecoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
}

impl RawEnvelope {
    pub fn from_bytes(bytes: &[u8]) -> HubResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| HubError::InvalidEnvelope(e.to_string()))
    }

    pub fn store_id(&self) -> Option<&str> {
        self.payload.get("store_id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::new(
            EventType::NewOrder,
            &json!({"id": "o-1", "store_id": "s-1"}),
        )
        .unwrap();

        let value: Value = serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(value["type"], "NEW_ORDER");
        assert_eq!(value["payload"]["id"], "o-1");
        assert_eq!(value.as_object().unwrap().len(), 2);
        assert_eq!(envelope.store_id(), Some("s-1"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Envelope::from_bytes(b"not json"),
            Err(HubError::InvalidEnvelope(_))
        ));
        assert!(Envelope::from_bytes(br#"{"type":"UNKNOWN","payload":{}}"#).is_err());
    }

    #[test]
    fn test_raw_envelope_keeps_unknown_types() {
        let raw = RawEnvelope::from_bytes(
            br#"{"type":"ORDER_REFUNDED","payload":{"store_id":"s-1","amount":5000}}"#,
        )
        .unwrap();
        assert_eq!(raw.event_type, "ORDER_REFUNDED");
        assert_eq!(raw.store_id(), Some("s-1"));

        assert!(RawEnvelope::from_bytes(br#"{"payload":{}}"#).is_err());
        assert!(RawEnvelope::from_bytes(b"[1,2]").is_err());
    }
}
