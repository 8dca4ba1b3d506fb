//! Notification list state merging.

#[cfg(test)]
#[path = "notifications_test.rs"]
mod notifications_test;

use crate::net::types::Notification;

/// Notification list and unread count. The counter always equals the number
/// of held items with `read == false`; every mutation updates both in the
/// same synchronous call.
#[derive(Clone, Debug, Default)]
pub struct NotificationState {
    /// Newest first.
    pub items: Vec<Notification>,
    pub unread_count: u32,
}

impl NotificationState {
    /// Ingest a bulk fetch: replace the list wholesale and recompute the
    /// unread count.
    pub fn replace_all(&mut self, items: Vec<Notification>) {
        self.unread_count =
            u32::try_from(items.iter().filter(|n| !n.read).count()).unwrap_or(u32::MAX);
        self.items = items;
    }

    /// Merge an inbound `new_notification` push: prepend and count.
    pub fn apply_push(&mut self, notification: Notification) {
        if !notification.read {
            self.unread_count += 1;
        }
        self.items.insert(0, notification);
    }

    /// Merge an inbound `notification_updated` push: replace the matching
    /// item in place. Unknown ids are dropped silently; updates are assumed
    /// not to change read status, so the counter is untouched.
    pub fn apply_update(&mut self, notification: Notification) {
        if let Some(slot) = self.items.iter_mut().find(|n| n.id == notification.id) {
            *slot = notification;
        }
    }

    /// Flip one item's read flag after the server confirmed the mutation.
    /// Returns false when the id is not held locally.
    pub fn mark_read(&mut self, id: &str) -> bool {
        let Some(item) = self.items.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !item.read {
            item.read = true;
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        true
    }

    /// Empty the list after every server-side delete succeeded.
    pub fn clear(&mut self) {
        self.items.clear();
        self.unread_count = 0;
    }
}
