//! Error types for the connection layer.
//!
//! [`AuthError`] is fatal to a connect attempt and never retried.
//! [`ConnectionError::Transport`] is retried by the backoff policy and only
//! reaches observers as [`ConnectionError::RetriesExhausted`] once the attempt
//! cap is hit. [`ConnectionError::NotConnected`] goes straight back to the
//! caller of a send, which decides whether to queue or drop.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Credential problems detected before opening a session.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Provider returned no token
    #[error("no authentication token available")]
    MissingToken,

    /// Token is empty or past its expiry
    #[error("authentication token expired")]
    ExpiredToken,

    /// Provider returned no signed-in user
    #[error("no signed-in user")]
    MissingIdentity,
}

/// Errors from connection supervision and sends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Handshake credentials unavailable
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Send attempted outside the `Connected` state
    #[error("not connected (state: {state:?})")]
    NotConnected {
        /// State at the time of the send
        state: ConnectionState,
    },

    /// Handshake or network failure reported by the transport
    #[error("transport error: {reason}")]
    Transport {
        /// Transport's description of the failure
        reason: String,
    },

    /// Reconnection gave up after the configured number of attempts
    #[error("connection lost after {attempts} reconnection attempts")]
    RetriesExhausted {
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl ConnectionError {
    /// Returns true if the backoff policy retries this error.
    ///
    /// Only transport failures are retried. Auth failures need new
    /// credentials, exhausted retries need an explicit connect, and
    /// `NotConnected` is the caller's to handle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
