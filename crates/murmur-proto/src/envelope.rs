//! Socket framing.
//!
//! Each text frame carries one event: `{"event": <name>, "data": <payload>}`.
//! A frame without `data` decodes with a `null` payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OutboundEvent, ProtocolError, Result};

/// One named event with its JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Wrap an outbound event.
    pub fn from_outbound(event: &OutboundEvent) -> Result<Self> {
        Ok(Self { event: event.name().to_string(), data: event.payload()? })
    }

    /// Parse a text frame.
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}
