//! Typing indicators.
//!
//! Two independent halves:
//!
//! - Local: debounces the current user's `user:typing:start` to one emission
//!   per burst and emits `user:typing:stop` after [`TypingConfig::local_idle`]
//!   without keystrokes.
//! - Remote: one entry per typing peer, keyed by user id, each with an expiry
//!   deadline in a [`TimerArena`]. Refreshing a peer replaces its deadline;
//!   removal and expiry both cancel it, so an entry is removed at most once.
//!
//! # Invariants
//!
//! - The current user never appears among remote entries
//! - At most one entry per user id
//! - Every remote entry has exactly one live deadline

use std::{sync::Arc, time::Duration};

use murmur_core::{
    AuthError, AuthProvider, EventSink, Instant, ListenerId, TimerArena, UserId,
};
use murmur_proto::OutboundEvent;
use tracing::{debug, trace};

use crate::{error::ClientError, store::Store};

/// Idle time after which the local burst ends.
pub const DEFAULT_LOCAL_IDLE: Duration = Duration::from_secs(3);

/// Silence after which a remote typist is dropped.
pub const DEFAULT_REMOTE_EXPIRY: Duration = Duration::from_secs(5);

/// Typing timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingConfig {
    /// Local burst ends after this long without `start_typing`
    pub local_idle: Duration,
    /// Remote entries expire after this long without a refresh
    pub remote_expiry: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { local_idle: DEFAULT_LOCAL_IDLE, remote_expiry: DEFAULT_REMOTE_EXPIRY }
    }
}

/// A peer currently typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEntry<I> {
    /// Peer's user id
    pub user_id: UserId,
    /// Display name, or the id when the peer sent none
    pub user_name: String,
    /// Room the peer is typing in
    pub chat_room_id: Option<String>,
    /// When the entry expires unless refreshed
    pub expires_at: I,
}

/// Local and remote typing state.
pub struct TypingCoordinator<I> {
    auth: Arc<dyn AuthProvider>,
    config: TypingConfig,
    /// Idle deadline of the local burst; `None` when not typing
    local_idle_at: Option<I>,
    remote: Store<Vec<TypingEntry<I>>>,
    timers: TimerArena<UserId, I>,
}

impl<I: Instant> std::fmt::Debug for TypingCoordinator<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingCoordinator")
            .field("config", &self.config)
            .field("local_idle_at", &self.local_idle_at)
            .field("remote", self.remote.get())
            .finish_non_exhaustive()
    }
}

impl<I: Instant> TypingCoordinator<I> {
    /// Create an idle coordinator for the user behind `auth`.
    pub fn new(auth: Arc<dyn AuthProvider>, config: TypingConfig) -> Self {
        Self {
            auth,
            config,
            local_idle_at: None,
            remote: Store::default(),
            timers: TimerArena::new(),
        }
    }

    /// Whether the local user is in a typing burst.
    pub fn is_local_active(&self) -> bool {
        self.local_idle_at.is_some()
    }

    /// Earliest deadline across the local burst and remote entries.
    pub fn next_deadline(&self) -> Option<I> {
        match (self.local_idle_at, self.timers.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Note a keystroke.
    ///
    /// Emits `user:typing:start` only when no burst is active; otherwise just
    /// pushes the idle deadline back. Returns whether an event was emitted.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingIdentity` when logged out
    /// - `ConnectionError::NotConnected` when the sink refuses the event; the
    ///   burst is not started
    pub fn start_typing(&mut self, sink: &mut impl EventSink, now: I) -> Result<bool, ClientError> {
        if self.local_idle_at.is_some() {
            self.local_idle_at = Some(now + self.config.local_idle);
            return Ok(false);
        }

        let me = self.auth.current_user().ok_or(AuthError::MissingIdentity)?;
        sink.send(OutboundEvent::TypingStart { user_id: me.id })?;

        self.local_idle_at = Some(now + self.config.local_idle);
        Ok(true)
    }

    /// End the local burst and emit `user:typing:stop`.
    ///
    /// Emits on every call, active burst or not.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingIdentity` when logged out
    /// - `ConnectionError::NotConnected` when the sink refuses the event; the
    ///   burst is ended regardless
    pub fn stop_typing(&mut self, sink: &mut impl EventSink) -> Result<(), ClientError> {
        self.local_idle_at = None;

        let me = self.auth.current_user().ok_or(AuthError::MissingIdentity)?;
        sink.send(OutboundEvent::TypingStop { user_id: me.id })?;
        Ok(())
    }

    /// Process time-based events: local idle stop and remote expiry.
    ///
    /// Returns the user ids whose remote entries expired.
    pub fn tick(&mut self, sink: &mut impl EventSink, now: I) -> Vec<UserId> {
        if self.local_idle_at.is_some_and(|deadline| deadline <= now)
            && let Err(err) = self.stop_typing(sink)
        {
            debug!(%err, "automatic typing stop not sent");
        }
        self.expire(now)
    }

    /// Start or refresh a remote typist.
    ///
    /// Ignored for the current user. Returns whether the entry set changed
    /// shape: a new typist, or a known one with a new name or room. Plain
    /// refreshes only move the deadline and return false.
    pub fn add_typing_user(
        &mut self,
        user_id: &str,
        user_name: Option<&str>,
        chat_room_id: Option<&str>,
        now: I,
    ) -> bool {
        if self.is_self(user_id) {
            trace!(user_id, "self typing suppressed");
            return false;
        }

        let expires_at = now + self.config.remote_expiry;
        self.timers.schedule(user_id.to_owned(), expires_at);

        let entry = TypingEntry {
            user_id: user_id.to_owned(),
            user_name: user_name.unwrap_or(user_id).to_owned(),
            chat_room_id: chat_room_id.map(str::to_owned),
            expires_at,
        };

        let reshaped = self.remote.get().iter().find(|e| e.user_id == user_id).is_none_or(|e| {
            e.user_name != entry.user_name || e.chat_room_id != entry.chat_room_id
        });
        self.remote.update(move |entries| {
            match entries.iter_mut().find(|e| e.user_id == entry.user_id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
            true
        });
        reshaped
    }

    /// Drop a remote typist and cancel its deadline. Returns whether it was
    /// present.
    pub fn remove_typing_user(&mut self, user_id: &str) -> bool {
        self.timers.cancel(&user_id.to_owned());
        self.remove_entry(user_id)
    }

    /// Remove remote entries whose deadline has passed, each exactly once.
    pub fn expire(&mut self, now: I) -> Vec<UserId> {
        let expired = self.timers.expire(now);
        for user_id in &expired {
            debug!(user_id, "typing entry expired");
            self.remove_entry(user_id);
        }
        expired
    }

    /// Remote entries in insertion order.
    pub fn entries(&self) -> Arc<Vec<TypingEntry<I>>> {
        self.remote.snapshot()
    }

    /// Subscribe to changes of the remote entries.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Arc<Vec<TypingEntry<I>>>) + Send + 'static,
    ) -> ListenerId {
        self.remote.subscribe(listener)
    }

    /// Display names of remote typists in insertion order.
    pub fn typing_names(&self) -> Vec<String> {
        self.remote.get().iter().map(|e| e.user_name.clone()).collect()
    }

    /// Display names of remote typists in one room.
    pub fn typing_names_in(&self, room_id: &str) -> Vec<String> {
        self.remote
            .get()
            .iter()
            .filter(|e| e.chat_room_id.as_deref().is_none_or(|room| room == room_id))
            .map(|e| e.user_name.clone())
            .collect()
    }

    /// One-line indicator such as `"Bob and Carol are typing..."`.
    pub fn summary(&self) -> Option<String> {
        summarize(&self.typing_names())
    }

    /// Drop every remote entry and its deadline.
    pub fn clear_remote(&mut self) {
        self.timers.clear();
        if !self.remote.get().is_empty() {
            self.remote.replace(Vec::new());
        }
    }

    /// Reset both halves without emitting anything.
    pub fn clear(&mut self) {
        self.local_idle_at = None;
        self.clear_remote();
    }

    fn is_self(&self, user_id: &str) -> bool {
        self.auth.current_user().is_some_and(|me| me.id == user_id)
    }

    fn remove_entry(&mut self, user_id: &str) -> bool {
        self.remote.update(|entries| {
            let before = entries.len();
            entries.retain(|e| e.user_id != user_id);
            entries.len() != before
        })
    }
}

/// Presentational summary of typing names.
pub fn summarize(names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{one} is typing...")),
        [a, b] => Some(format!("{a} and {b} are typing...")),
        [a, b, rest @ ..] => {
            let others = match rest.len() {
                1 => "1 other".to_owned(),
                n => format!("{n} others"),
            };
            Some(format!("{a}, {b} and {others} are typing..."))
        },
    }
}
