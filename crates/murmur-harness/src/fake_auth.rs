//! Scriptable auth provider.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use murmur_core::{AuthProvider, BearerToken, Identity};

/// Auth provider whose user and token tests can change mid-run.
///
/// Counts token fetches so tests can check that every connection attempt
/// asked for a fresh token.
#[derive(Debug, Default)]
pub struct FakeAuth {
    identity: Mutex<Option<Identity>>,
    token: Mutex<Option<BearerToken>>,
    token_fetches: AtomicUsize,
}

impl FakeAuth {
    /// Signed-in user `id`/`name` with a non-expiring token.
    pub fn signed_in(id: &str, name: &str) -> Self {
        Self {
            identity: Mutex::new(Some(Identity::new(id, name))),
            token: Mutex::new(Some(BearerToken::new(format!("token-{id}")))),
            token_fetches: AtomicUsize::new(0),
        }
    }

    /// Replace the token.
    pub fn set_token(&self, token: Option<BearerToken>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Drop the token, as when a session is revoked server-side.
    pub fn revoke_token(&self) {
        self.set_token(None);
    }

    /// Drop both user and token.
    pub fn log_out(&self) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.revoke_token();
    }

    /// How many times a token was requested.
    pub fn token_fetches(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }
}

impl AuthProvider for FakeAuth {
    fn current_user(&self) -> Option<Identity> {
        self.identity.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn bearer_token(&self) -> Option<BearerToken> {
        self.token_fetches.fetch_add(1, Ordering::SeqCst);
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
