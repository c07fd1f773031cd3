//! Client error types.

use murmur_core::{AuthError, ConnectionError};
use murmur_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced to callers of the client and its stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection layer refused the operation
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Inbound event could not be decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        Self::Connection(ConnectionError::Auth(err))
    }
}

impl ClientError {
    /// Returns true if retrying the same operation later can succeed.
    ///
    /// A send refused because the connection is down is worth re-queueing
    /// once it comes back. Decode failures never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(ConnectionError::NotConnected { .. }) => true,
            Self::Connection(err) => err.is_transient(),
            Self::Protocol(_) => false,
        }
    }

    /// Whether this is a send attempted while disconnected.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::NotConnected { .. }))
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::ConnectionState;

    use super::*;

    #[test]
    fn not_connected_is_transient() {
        let err = ClientError::from(ConnectionError::NotConnected {
            state: ConnectionState::Reconnecting { attempt: 2 },
        });
        assert!(err.is_transient());
        assert!(err.is_not_connected());
    }

    #[test]
    fn protocol_and_auth_errors_are_not() {
        let err = ClientError::from(ProtocolError::UnknownEvent { name: "x".into() });
        assert!(!err.is_transient());
        assert!(!ClientError::from(AuthError::MissingIdentity).is_transient());
    }
}
