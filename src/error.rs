//! Error taxonomy for the client.
//!
//! ERROR HANDLING
//! ==============
//! Store-level operations that fail leave prior local state untouched and
//! surface one of these variants to the caller; background work (scheduled
//! refresh, presence merges) logs and stays silent except for the terminal
//! cases (`RefreshFailed`, `ReconnectExhausted`).

use std::sync::Arc;

/// Error returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No session token is stored; the caller must log in first.
    #[error("no session token available")]
    NoToken,
    /// The stored token could not be decoded. Treated as "refresh needed
    /// now" by the token manager, never as fatal.
    #[error("malformed session token: {0}")]
    MalformedToken(String),
    /// A coalesced refresh shared by multiple callers failed. The underlying
    /// error is reference-counted so every waiter receives the same cause.
    #[error("token refresh failed: {0}")]
    RefreshFailed(Arc<ClientError>),
    /// The server rejected the token even after a silent refresh and retry.
    #[error("authentication expired")]
    AuthExpired,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// `send_message` was called with no active conversation selected.
    #[error("no active conversation selected")]
    NoActiveConversation,
    /// The connection task gave up after the reconnect attempt ceiling.
    #[error("reconnect attempts exhausted after {attempts} failures")]
    ReconnectExhausted { attempts: u32 },
}
