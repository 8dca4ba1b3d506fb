//! Conversation and message state merging.
//!
//! DESIGN
//! ======
//! All mutation happens through these methods so the unread counters always
//! equal the count of unread items in the same synchronous update. Inbound
//! events referencing unknown conversation ids are dropped: a conversation
//! must already exist locally (from a fetch or create response) before push
//! events can touch it, which keeps interleaved fetch/push races idempotent.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use crate::net::types::{ChatMessage, Conversation};

/// Conversation list, active conversation, and aggregate unread count.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    /// Ordered by most-recent-activity descending.
    pub conversations: Vec<Conversation>,
    /// The conversation currently open in the UI, if any.
    pub active_chat: Option<String>,
    /// Sum of per-conversation unread counts.
    pub unread_total: u32,
}

impl ChatState {
    /// Ingest a bulk fetch: filter the current user out of each participant
    /// list, recompute the aggregate unread count, and sort by activity.
    pub fn replace_conversations(&mut self, current_user: &str, mut list: Vec<Conversation>) {
        for conversation in &mut list {
            conversation.participants.retain(|peer| peer.id != current_user);
        }
        self.unread_total = list.iter().map(|c| c.unread_count).sum();
        self.conversations = list;
        self.sort_by_activity();
    }

    /// Ingest a create-or-get response. An id already held locally keeps the
    /// local copy (preserving in-memory message history); a new conversation
    /// is prepended.
    pub fn upsert_conversation(&mut self, current_user: &str, mut conversation: Conversation) {
        if self.conversations.iter().any(|c| c.id == conversation.id) {
            return;
        }
        conversation.participants.retain(|peer| peer.id != current_user);
        self.unread_total += conversation.unread_count;
        self.conversations.insert(0, conversation);
    }

    pub fn set_active(&mut self, chat_id: Option<String>) {
        self.active_chat = chat_id;
    }

    /// Reconcile the server-confirmed copy of a locally sent message. A
    /// local entry with the same correlation id or server id is replaced in
    /// place; otherwise the confirmed copy is appended.
    pub fn apply_sent_message(&mut self, chat_id: &str, confirmed: ChatMessage) {
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == chat_id) else {
            return;
        };

        let slot = conversation.messages.iter_mut().find(|m| {
            matches_correlation(m.client_id.as_deref(), confirmed.client_id.as_deref())
                || matches_correlation(m.id.as_deref(), confirmed.id.as_deref())
        });
        if let Some(existing) = slot {
            *existing = confirmed.clone();
        } else {
            conversation.messages.push(confirmed.clone());
        }
        conversation.updated_at = confirmed.created_at;
        conversation.last_message = Some(confirmed);
        self.sort_by_activity();
    }

    /// Merge an inbound `new_message` push. Unknown conversation ids are
    /// dropped. Self-echoes (the sender is the current user, or the message
    /// matches a held correlation/server id) are suppressed so the send path
    /// and the push path never double-append. Messages for a non-active
    /// conversation bump its unread count.
    pub fn apply_new_message(&mut self, current_user: &str, chat_id: &str, message: ChatMessage) {
        let active = self.active_chat.as_deref() == Some(chat_id);
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == chat_id) else {
            return;
        };

        let echo = message.sender.id == current_user
            || conversation.messages.iter().any(|m| {
                matches_correlation(m.client_id.as_deref(), message.client_id.as_deref())
                    || matches_correlation(m.id.as_deref(), message.id.as_deref())
            });
        if echo {
            return;
        }

        conversation.updated_at = message.created_at;
        conversation.last_message = Some(message.clone());
        conversation.messages.push(message);
        if !active {
            conversation.unread_count += 1;
            self.unread_total += 1;
        }
        self.sort_by_activity();
    }

    /// Merge an inbound `message_read` push. Only the current user's own
    /// read receipts zero the referenced conversation's unread count.
    pub fn apply_message_read(&mut self, current_user: &str, chat_id: &str, reader: &str) {
        if reader != current_user {
            return;
        }
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == chat_id) {
            self.unread_total = self.unread_total.saturating_sub(conversation.unread_count);
            conversation.unread_count = 0;
        }
    }

    /// Most-recent-activity descending; ties break on ascending id so two
    /// events with identical timestamps still order deterministically.
    fn sort_by_activity(&mut self) {
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    }
}

fn matches_correlation(held: Option<&str>, incoming: Option<&str>) -> bool {
    match (held, incoming) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
