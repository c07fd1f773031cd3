//! Keyed deadline arena.
//!
//! Replaces per-key `setTimeout` handles with deadlines that the owner polls
//! via [`TimerArena::expire`]. Each key holds at most one live timer:
//! scheduling a key cancels whatever timer it had. Each expired timer is
//! reported exactly once and then forgotten.
//!
//! Handles are generation-tagged, so cancelling through a stale handle (one
//! whose timer was already replaced or fired) is a no-op.

use std::{collections::HashMap, hash::Hash};

use crate::env::Instant;

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Slot<I> {
    handle: TimerHandle,
    deadline: I,
}

/// Cancellable timers keyed by `K`.
#[derive(Debug, Clone)]
pub struct TimerArena<K, I> {
    slots: HashMap<K, Slot<I>>,
    next_handle: u64,
}

impl<K, I> Default for TimerArena<K, I> {
    fn default() -> Self {
        Self { slots: HashMap::new(), next_handle: 0 }
    }
}

impl<K, I> TimerArena<K, I>
where
    K: Eq + Hash + Clone,
    I: Instant,
{
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `deadline`, cancelling its previous timer.
    pub fn schedule(&mut self, key: K, deadline: I) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.slots.insert(key, Slot { handle, deadline });
        handle
    }

    /// Cancel the timer for `key`. Returns `false` if none was scheduled.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Cancel `key` only if `handle` is still its live timer.
    pub fn cancel_handle(&mut self, key: &K, handle: TimerHandle) -> bool {
        if self.slots.get(key).is_some_and(|slot| slot.handle == handle) {
            self.slots.remove(key);
            true
        } else {
            false
        }
    }

    /// Deadline of the live timer for `key`.
    pub fn deadline(&self, key: &K) -> Option<I> {
        self.slots.get(key).map(|slot| slot.deadline)
    }

    /// Whether `key` has a live timer.
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Earliest live deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.slots.values().map(|slot| slot.deadline).min()
    }

    /// Remove and return every key whose deadline is at or before `now`,
    /// earliest first.
    pub fn expire(&mut self, now: I) -> Vec<K> {
        let mut due: Vec<(I, TimerHandle, K)> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.deadline <= now)
            .map(|(key, slot)| (slot.deadline, slot.handle, key.clone()))
            .collect();

        due.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.0.cmp(&b.1.0)));

        for (_, _, key) in &due {
            self.slots.remove(key);
        }

        due.into_iter().map(|(_, _, key)| key).collect()
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no timers are live.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Cancel every timer.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn reschedule_replaces_previous_timer() {
        let t0 = Instant::now();
        let mut arena = TimerArena::new();

        let first = arena.schedule("alice", t0 + Duration::from_secs(5));
        let second = arena.schedule("alice", t0 + Duration::from_secs(8));

        assert_ne!(first, second);
        assert_eq!(arena.len(), 1);
        assert!(arena.expire(t0 + Duration::from_secs(6)).is_empty());
        assert_eq!(arena.expire(t0 + Duration::from_secs(8)), vec!["alice"]);
    }

    #[test]
    fn expired_timers_fire_once() {
        let t0 = Instant::now();
        let mut arena = TimerArena::new();
        arena.schedule(1u32, t0 + Duration::from_secs(1));

        assert_eq!(arena.expire(t0 + Duration::from_secs(2)), vec![1]);
        assert!(arena.expire(t0 + Duration::from_secs(3)).is_empty());
        assert!(arena.is_empty());
    }

    #[test]
    fn stale_handle_cannot_cancel_replacement() {
        let t0 = Instant::now();
        let mut arena = TimerArena::new();

        let stale = arena.schedule("bob", t0 + Duration::from_secs(1));
        let live = arena.schedule("bob", t0 + Duration::from_secs(2));

        assert!(!arena.cancel_handle(&"bob", stale));
        assert!(arena.is_scheduled(&"bob"));
        assert!(arena.cancel_handle(&"bob", live));
        assert!(!arena.is_scheduled(&"bob"));
    }

    #[test]
    fn expire_orders_by_deadline() {
        let t0 = Instant::now();
        let mut arena = TimerArena::new();
        arena.schedule("late", t0 + Duration::from_secs(3));
        arena.schedule("early", t0 + Duration::from_secs(1));
        arena.schedule("mid", t0 + Duration::from_secs(2));

        assert_eq!(arena.next_deadline(), Some(t0 + Duration::from_secs(1)));
        assert_eq!(arena.expire(t0 + Duration::from_secs(5)), vec!["early", "mid", "late"]);
    }
}
