//! Observable snapshot container.
//!
//! State is held behind an `Arc` and replaced wholesale on every mutation, so
//! a snapshot handed to a reader never changes underneath it. Subscribers are
//! notified synchronously with the new snapshot after each replacement.

use std::sync::Arc;

use murmur_core::{ListenerId, Listeners};

/// Snapshot-replace state container.
#[derive(Debug)]
pub struct Store<S> {
    state: Arc<S>,
    version: u64,
    listeners: Listeners<Arc<S>>,
}

impl<S: Default> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> Store<S> {
    /// Create a store holding `initial`.
    pub fn new(initial: S) -> Self {
        Self { state: Arc::new(initial), version: 0, listeners: Listeners::new() }
    }

    /// Current state.
    pub fn get(&self) -> &S {
        &self.state
    }

    /// Shared handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }

    /// Number of replacements since creation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the state and notify subscribers.
    pub fn replace(&mut self, next: S) {
        self.state = Arc::new(next);
        self.version += 1;
        self.listeners.notify(&self.state);
    }

    /// Subscribe to replacements.
    pub fn subscribe(&mut self, listener: impl FnMut(&Arc<S>) + Send + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl<S: Clone> Store<S> {
    /// Derive the next state from a copy of the current one.
    ///
    /// `mutate` returns whether it changed anything; unchanged copies are
    /// discarded without notifying.
    pub fn update(&mut self, mutate: impl FnOnce(&mut S) -> bool) -> bool {
        let mut next = S::clone(&self.state);
        if mutate(&mut next) {
            self.replace(next);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn old_snapshots_are_untouched() {
        let mut store = Store::new(vec![1]);
        let before = store.snapshot();

        store.update(|items| {
            items.push(2);
            true
        });

        assert_eq!(*before, vec![1]);
        assert_eq!(*store.get(), vec![1, 2]);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn unchanged_update_does_not_notify() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut store = Store::new(0u32);
        let sink = Arc::clone(&seen);
        store.subscribe(move |state| sink.lock().unwrap().push(**state));

        assert!(!store.update(|_| false));
        store.replace(7);

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }
}
