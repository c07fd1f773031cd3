//! Identity and credentials.
//!
//! Login, signup and credential storage live outside this crate. The client
//! only reads the current user and a bearer token through [`AuthProvider`].

use std::fmt;

/// User identifier as issued by the backend.
pub type UserId = String;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Bearer token presented in the transport handshake.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    expires_at_ms: Option<u64>,
}

impl BearerToken {
    /// Token without a known expiry.
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), expires_at_ms: None }
    }

    /// Token that expires at `expires_at_ms` (epoch milliseconds).
    #[must_use]
    pub fn expiring_at(mut self, expires_at_ms: u64) -> Self {
        self.expires_at_ms = Some(expires_at_ms);
        self
    }

    /// Raw token value.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Expiry, if known.
    pub fn expires_at_ms(&self) -> Option<u64> {
        self.expires_at_ms
    }

    /// Whether the token is empty or past its expiry at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.value.is_empty() || self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Source of the current identity and token.
///
/// Called on every connect and every reconnect attempt, so implementations
/// can hand out refreshed tokens.
pub trait AuthProvider: Send + Sync {
    /// Signed-in user. `None` when logged out.
    fn current_user(&self) -> Option<Identity>;

    /// Token for the next handshake. `None` when logged out.
    fn bearer_token(&self) -> Option<BearerToken>;
}

/// Fixed identity and token, for the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    identity: Option<Identity>,
    token: Option<BearerToken>,
}

impl StaticAuth {
    /// Signed-in user with a token.
    pub fn new(identity: Identity, token: BearerToken) -> Self {
        Self { identity: Some(identity), token: Some(token) }
    }

    /// Logged-out provider.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<Identity> {
        self.identity.clone()
    }

    fn bearer_token(&self) -> Option<BearerToken> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let token = BearerToken::new("s3cret");
        assert!(!format!("{token:?}").contains("s3cret"));
    }

    #[test]
    fn expiry() {
        let token = BearerToken::new("t").expiring_at(1_000);
        assert!(!token.is_expired(999));
        assert!(token.is_expired(1_000));
        assert!(BearerToken::new("").is_expired(0));
        assert!(!BearerToken::new("t").is_expired(u64::MAX));
    }
}
