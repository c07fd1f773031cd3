//! Protocol errors.
//!
//! Raised when an inbound event cannot be turned into an [`crate::InboundEvent`]
//! or an outbound event cannot be encoded. A protocol error never tears down
//! the connection: the offending event is dropped and logged by the caller.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced at the wire boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Event name is not part of the protocol.
    #[error("unknown event: {name}")]
    UnknownEvent {
        /// Event name as received
        name: String,
    },

    /// Payload does not match the shape expected for the event.
    #[error("malformed payload for {event}: {reason}")]
    MalformedPayload {
        /// Event whose payload failed validation
        event: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Socket frame is not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Outbound event could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}
