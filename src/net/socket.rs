//! Shared realtime connection lifecycle.
//!
//! DESIGN
//! ======
//! One connection task per session. The task obtains a fresh token, opens
//! the transport, applies presence events to the shared connection state,
//! and fans every inbound event out on a broadcast channel for the store
//! layer. Failures reconnect with bounded exponential backoff; after the
//! attempt ceiling the task stops and records a terminal error.
//!
//! The transport sits behind a trait so tests can script connect failures
//! and event sequences without a server.

#[cfg(test)]
#[path = "socket_test.rs"]
mod socket_test;

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net::types::{ServerEvent, SocketAuth};
use crate::session::token::TokenManager;
use crate::state::connection::{ConnectionState, ConnectionStatus};

/// Inbound half of an open realtime connection.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent, ClientError>> + Send>>;

/// Opens the realtime channel. Production is [`TungsteniteTransport`].
#[async_trait::async_trait]
pub trait SocketTransport: Send + Sync {
    /// Open a connection authenticated by `auth` and return the inbound
    /// event stream. The stream ends when the transport drops.
    async fn connect(&self, auth: &SocketAuth) -> Result<EventStream, ClientError>;
}

/// Websocket transport: sends the auth payload as the first frame, then
/// parses inbound text frames into [`ServerEvent`]s. Frames that do not
/// parse are logged and dropped.
pub struct TungsteniteTransport {
    url: String,
}

impl TungsteniteTransport {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait::async_trait]
impl SocketTransport for TungsteniteTransport {
    async fn connect(&self, auth: &SocketAuth) -> Result<EventStream, ClientError> {
        let (mut stream, _) = connect_async(&self.url)
            .await
            .map_err(|error| ClientError::WsConnect(Box::new(error)))?;

        let hello = serde_json::to_string(&serde_json::json!({
            "event": "connect",
            "data": auth,
        }))?;
        stream
            .send(Message::Text(hello.into()))
            .await
            .map_err(|error| ClientError::WsConnect(Box::new(error)))?;

        let events = stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => Some(Ok(event)),
                    Err(error) => {
                        tracing::warn!(%error, "dropping unparsable realtime frame");
                        None
                    }
                },
                Ok(Message::Close(_)) => Some(Err(ClientError::WsClosed)),
                Ok(_) => None,
                Err(error) => Some(Err(ClientError::WsConnect(Box::new(error)))),
            }
        });

        Ok(Box::pin(events))
    }
}

/// Backoff before reconnect attempt `attempts + 1`: base doubled per
/// prior failure.
#[must_use]
pub(crate) fn reconnect_delay(base: Duration, attempts: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempts))
}

/// Owns the single realtime connection for a session.
pub struct SocketManager {
    transport: Arc<dyn SocketTransport>,
    tokens: Arc<TokenManager>,
    user_id: String,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<ServerEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketManager {
    #[must_use]
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        tokens: Arc<TokenManager>,
        user_id: String,
        config: &ClientConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            transport,
            tokens,
            user_id,
            reconnect_delay: config.reconnect_delay,
            max_reconnect_attempts: config.max_reconnect_attempts,
            state: Arc::new(RwLock::new(ConnectionState::default())),
            events,
            task: Mutex::new(None),
        }
    }

    /// Observable connection state, including the presence map.
    #[must_use]
    pub fn state(&self) -> Arc<RwLock<ConnectionState>> {
        Arc::clone(&self.state)
    }

    /// Subscribe to inbound realtime events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Start the connection task. A no-op while a task is already live, so
    /// repeated calls never register duplicate handlers.
    pub fn connect(self: &Arc<Self>) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move { manager.run().await }));
    }

    /// Tear the connection down: abort the task, clear the presence map,
    /// and reset the attempt counter. Called when the session ends.
    pub async fn disconnect(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        let mut state = self.state.write().await;
        *state = ConnectionState::default();
    }

    async fn run(self: Arc<Self>) {
        let mut failures: u32 = 0;
        loop {
            {
                let mut state = self.state.write().await;
                state.status = ConnectionStatus::Connecting;
            }

            match self.connect_once().await {
                Ok(stream) => {
                    {
                        let mut state = self.state.write().await;
                        state.status = ConnectionStatus::Connected;
                        state.reconnecting = false;
                        state.attempts = 0;
                        state.last_error = None;
                    }
                    failures = 0;
                    tracing::info!("realtime connection established");

                    self.pump(stream).await;

                    let mut state = self.state.write().await;
                    state.status = ConnectionStatus::Disconnected;
                    state.online_users.clear();
                    state.reconnecting = true;
                    tracing::info!("realtime connection lost, reconnecting");
                }
                Err(error) => {
                    failures += 1;
                    tracing::warn!(%error, attempt = failures, "realtime connect failed");
                    {
                        let mut state = self.state.write().await;
                        state.status = ConnectionStatus::Disconnected;
                        state.attempts = failures;
                        state.last_error = Some(error.to_string());
                    }

                    if failures >= self.max_reconnect_attempts {
                        let terminal =
                            ClientError::ReconnectExhausted { attempts: failures };
                        tracing::warn!(%terminal, "giving up on realtime connection");
                        let mut state = self.state.write().await;
                        state.reconnecting = false;
                        state.last_error = Some(terminal.to_string());
                        return;
                    }

                    {
                        let mut state = self.state.write().await;
                        state.reconnecting = true;
                    }
                    tokio::time::sleep(reconnect_delay(self.reconnect_delay, failures - 1))
                        .await;
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<EventStream, ClientError> {
        let token = self.tokens.ensure_fresh().await?;
        let auth = SocketAuth { token: token.raw, user_id: self.user_id.clone() };
        self.transport.connect(&auth).await
    }

    /// Forward inbound events until the stream ends: presence events mutate
    /// the connection state, and every event fans out to subscribers.
    async fn pump(&self, mut stream: EventStream) {
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    self.apply_presence(&event).await;
                    let _ = self.events.send(event);
                }
                Err(error) => {
                    tracing::warn!(%error, "realtime stream error");
                    break;
                }
            }
        }
    }

    async fn apply_presence(&self, event: &ServerEvent) {
        match event {
            ServerEvent::InitialOnlineUsers(peers) => {
                self.state.write().await.apply_snapshot(peers.clone());
            }
            ServerEvent::UserConnected(peer) => {
                self.state.write().await.apply_join(peer.clone());
            }
            ServerEvent::UserDisconnected(user_id) => {
                self.state.write().await.apply_leave(user_id);
            }
            _ => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
