//! Realtime connection status and the online-presence map.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::collections::HashMap;

use serde_json::Value;

use crate::net::types::OnlinePeer;

/// Lifecycle position of the realtime connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Observable state of the shared realtime connection. Owned by the socket
/// manager; read-only to consumers. The presence map is authoritative only
/// as of the last received event.
#[derive(Clone, Debug, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// True while the manager is between reconnect attempts.
    pub reconnecting: bool,
    /// Consecutive failed connect attempts.
    pub attempts: u32,
    /// Last connection error, terminal once the attempt ceiling is hit.
    pub last_error: Option<String>,
    /// Online user id -> server-supplied presence metadata.
    pub online_users: HashMap<String, Value>,
}

impl ConnectionState {
    /// Replace the presence map wholesale from the initial snapshot.
    pub fn apply_snapshot(&mut self, peers: Vec<OnlinePeer>) {
        self.online_users =
            peers.into_iter().map(|peer| (peer.user_id, peer.user_data)).collect();
    }

    /// Insert (or refresh) one presence entry. Re-announcing an already
    /// online user must not produce a duplicate entry.
    pub fn apply_join(&mut self, peer: OnlinePeer) {
        self.online_users.insert(peer.user_id, peer.user_data);
    }

    /// Remove one presence entry. Unknown ids are ignored.
    pub fn apply_leave(&mut self, user_id: &str) {
        self.online_users.remove(user_id);
    }

    #[must_use]
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_users.contains_key(user_id)
    }
}
