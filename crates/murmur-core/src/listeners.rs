//! Observer registry.
//!
//! Listeners are boxed callbacks keyed by a [`ListenerId`] so the caller that
//! registered one can remove exactly that one later.

use std::fmt;

/// Registration token returned by [`Listeners::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// Ordered set of callbacks notified with `&T`.
pub struct Listeners<T> {
    entries: Vec<(ListenerId, Callback<T>)>,
    next_id: u64,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self { entries: Vec::new(), next_id: 0 }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("count", &self.entries.len()).finish()
    }
}

impl<T> Listeners<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn add(&mut self, callback: impl FnMut(&T) + Send + 'static) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was already removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Call every callback in registration order.
    pub fn notify(&mut self, value: &T) {
        for (_, callback) in &mut self.entries {
            callback(value);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
