//! Online-user set.
//!
//! Membership changes only on explicit online/offline events. Adding a
//! present id or removing an absent one is a no-op: the snapshot is not
//! replaced and subscribers are not notified.

use std::{collections::BTreeSet, sync::Arc};

use murmur_core::{ListenerId, UserId};
use tracing::trace;

use crate::store::Store;

/// Tracks which peers are online.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: Store<BTreeSet<UserId>>,
}

impl PresenceTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` online. Returns whether the set changed.
    pub fn set_online(&mut self, user_id: &str) -> bool {
        let changed = self.online.update(|set| set.insert(user_id.to_owned()));
        trace!(user_id, changed, "online");
        changed
    }

    /// Mark `user_id` offline. Returns whether the set changed.
    pub fn set_offline(&mut self, user_id: &str) -> bool {
        let changed = self.online.update(|set| set.remove(user_id));
        trace!(user_id, changed, "offline");
        changed
    }

    /// Mark several users online in one replacement.
    pub fn set_many_online<'a>(&mut self, user_ids: impl IntoIterator<Item = &'a str>) -> bool {
        self.online.update(|set| {
            user_ids.into_iter().fold(false, |changed, id| set.insert(id.to_owned()) || changed)
        })
    }

    /// Mark several users offline in one replacement.
    pub fn set_many_offline<'a>(&mut self, user_ids: impl IntoIterator<Item = &'a str>) -> bool {
        self.online.update(|set| user_ids.into_iter().fold(false, |changed, id| set.remove(id) || changed))
    }

    /// Whether `user_id` is online.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.get().contains(user_id)
    }

    /// Number of online users.
    pub fn count(&self) -> usize {
        self.online.get().len()
    }

    /// Online user ids, sorted.
    pub fn online_users(&self) -> Vec<UserId> {
        self.online.get().iter().cloned().collect()
    }

    /// Shared snapshot of the online set.
    pub fn snapshot(&self) -> Arc<BTreeSet<UserId>> {
        self.online.snapshot()
    }

    /// Subscribe to membership changes.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Arc<BTreeSet<UserId>>) + Send + 'static,
    ) -> ListenerId {
        self.online.subscribe(listener)
    }

    /// Forget everyone.
    pub fn clear(&mut self) {
        self.online.update(|set| {
            let changed = !set.is_empty();
            set.clear();
            changed
        });
    }
}
