//! Wire models shared by the REST and realtime layers.
//!
//! Field names follow the backend's document-store conventions (`_id`,
//! camelCase); timestamps are milliseconds since the Unix epoch. Inbound
//! realtime events form a closed tagged union so that adding or removing an
//! event type is a compile-time-checked change, not a stringly-typed one.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user as referenced by conversations and messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The authenticated user as returned by the auth endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A single chat message. `id` is server-assigned and absent until the
/// send is confirmed; `client_id` is the client-generated correlation id
/// used to reconcile the confirmed copy with the locally appended one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub sender: Peer,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// A 1:1 conversation. The locally held participant list excludes the
/// current user once ingested by the chat state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<Peer>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "lastMessage", default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<ChatMessage>,
    #[serde(rename = "unreadCount", default)]
    pub unread_count: u32,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

/// A user notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// Presence metadata for one online user. `user_data` is an arbitrary
/// server-supplied payload (last-seen, status) and is not interpreted here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnlinePeer {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userData", default)]
    pub user_data: Value,
}

/// Authentication payload sent as the first frame after the websocket opens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocketAuth {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Inbound realtime events, tagged by event name on the wire:
/// `{ "event": "new_message", "data": { ... } }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Wholesale presence snapshot delivered right after connecting.
    InitialOnlineUsers(Vec<OnlinePeer>),
    /// A user opened a realtime connection.
    UserConnected(OnlinePeer),
    /// A user's last realtime connection closed. Payload is the bare id.
    UserDisconnected(String),
    /// A message was appended to a conversation.
    NewMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        message: ChatMessage,
    },
    /// A participant read a conversation.
    MessageRead {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// A notification was created for the current user.
    NewNotification(Notification),
    /// An existing notification changed server-side.
    NotificationUpdated(Notification),
}

/// Credentials for `POST /auth/login`.
#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response of `POST /auth/login`.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Response of `POST /auth/refresh-token`.
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}
