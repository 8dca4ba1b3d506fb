//! Session-scoped client facade.
//!
//! DESIGN
//! ======
//! A `Client` is constructed once per authenticated session and torn down on
//! logout, so the realtime connection and its listeners never outlive the
//! session that authenticated them. It owns one token manager, one REST
//! client, one socket manager, and the chat/notification state; inbound
//! realtime events flow through a single dispatcher task into the state.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net::api::{ApiClient, HttpRefresh};
use crate::net::socket::{SocketManager, SocketTransport, TungsteniteTransport};
use crate::net::types::{ChatMessage, LoginRequest, LoginResponse, ServerEvent, UserProfile};
use crate::session::store::{MemoryTokenStore, TokenStore};
use crate::session::token::TokenManager;
use crate::state::chat::ChatState;
use crate::state::connection::ConnectionState;
use crate::state::notifications::NotificationState;

/// One authenticated GuestCode session.
pub struct Client {
    user: UserProfile,
    tokens: Arc<TokenManager>,
    api: Arc<ApiClient>,
    socket: Arc<SocketManager>,
    chat: Arc<RwLock<ChatState>>,
    notifications: Arc<RwLock<NotificationState>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Authenticate and build a session-scoped client with an in-memory
    /// token store and the websocket transport.
    ///
    /// # Errors
    ///
    /// [`ClientError::Api`] on rejected credentials, transport errors
    /// otherwise.
    pub async fn login(
        config: ClientConfig,
        email: &str,
        password: &str,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::new();
        let credentials =
            LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let session = crate::net::api::login(&http, &config.base_url, &credentials).await?;
        let transport = Arc::new(TungsteniteTransport::new(config.ws_url()?));
        Self::from_session(config, http, Arc::new(MemoryTokenStore::default()), transport, session)
    }

    /// Build a client from an existing session (token + user), a custom
    /// token store, and a custom realtime transport. This is the seam the
    /// host uses to plug in durable token storage, and tests use to script
    /// the transport.
    ///
    /// # Errors
    ///
    /// [`ClientError::MalformedToken`] when the session token is
    /// undecodable.
    pub fn from_session(
        config: ClientConfig,
        http: reqwest::Client,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn SocketTransport>,
        session: LoginResponse,
    ) -> Result<Self, ClientError> {
        let refresh = Arc::new(HttpRefresh::new(http.clone(), config.base_url.clone()));
        let tokens = Arc::new(TokenManager::new(store, refresh, config.refresh_threshold));
        tokens.set_token(&session.token)?;
        tokens.spawn_refresh_schedule();

        let api = Arc::new(ApiClient::new(&config, http, Arc::clone(&tokens)));
        let socket = Arc::new(SocketManager::new(
            transport,
            Arc::clone(&tokens),
            session.user.id.clone(),
            &config,
        ));

        Ok(Self {
            user: session.user,
            tokens,
            api,
            socket,
            chat: Arc::new(RwLock::new(ChatState::default())),
            notifications: Arc::new(RwLock::new(NotificationState::default())),
            dispatcher: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    #[must_use]
    pub fn chat_state(&self) -> Arc<RwLock<ChatState>> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn notification_state(&self) -> Arc<RwLock<NotificationState>> {
        Arc::clone(&self.notifications)
    }

    #[must_use]
    pub fn connection_state(&self) -> Arc<RwLock<ConnectionState>> {
        self.socket.state()
    }

    /// Subscribe to raw inbound realtime events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.socket.subscribe()
    }

    /// Open the realtime connection and start routing inbound events into
    /// the chat/notification state. Idempotent while already connected.
    pub fn connect(&self) {
        self.socket.connect();

        let mut dispatcher = lock(&self.dispatcher);
        if dispatcher.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let mut events = self.socket.subscribe();
        let user_id = self.user.id.clone();
        let chat = Arc::clone(&self.chat);
        let notifications = Arc::clone(&self.notifications);
        *dispatcher = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => dispatch_event(&user_id, &chat, &notifications, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "realtime dispatcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Tear down the realtime connection and the dispatcher.
    pub async fn disconnect(&self) {
        if let Some(handle) = lock(&self.dispatcher).take() {
            handle.abort();
        }
        self.socket.disconnect().await;
    }

    /// End the session: notify the server, tear down the connection, and
    /// drop the stored token. Local teardown happens even when the server
    /// call fails; the failure is still surfaced.
    ///
    /// # Errors
    ///
    /// The logout request's failure, after teardown completed.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.api.logout().await;
        self.disconnect().await;
        self.tokens.clear();
        result
    }

    /// Run the token staleness check immediately; see
    /// [`TokenManager::notify_visible`].
    pub async fn notify_visible(&self) {
        self.tokens.notify_visible().await;
    }

    // =========================================================
    // Chat operations
    // =========================================================

    /// Fetch all conversations and replace the local list.
    ///
    /// # Errors
    ///
    /// Request failures leave prior state intact.
    pub async fn fetch_conversations(&self) -> Result<(), ClientError> {
        let list = self.api.list_conversations().await?;
        self.chat.write().await.replace_conversations(&self.user.id, list);
        Ok(())
    }

    /// Create (or fetch) the 1:1 conversation with another user, returning
    /// its id. An existing local copy is kept.
    ///
    /// # Errors
    ///
    /// Request failures leave prior state intact.
    pub async fn create_or_get_conversation(
        &self,
        other_user_id: &str,
    ) -> Result<String, ClientError> {
        let conversation = self.api.create_conversation(other_user_id).await?;
        let id = conversation.id.clone();
        self.chat.write().await.upsert_conversation(&self.user.id, conversation);
        Ok(id)
    }

    pub async fn set_active_chat(&self, chat_id: Option<String>) {
        self.chat.write().await.set_active(chat_id);
    }

    /// Send a message to the active conversation: persist, then reconcile
    /// the server-confirmed copy into local state. The correlation id on
    /// the request lets the inbound echo be suppressed by id rather than
    /// sender identity alone.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoActiveConversation`] without an active chat;
    /// request failures leave prior state intact.
    pub async fn send_message(&self, content: &str) -> Result<ChatMessage, ClientError> {
        let chat_id = self
            .chat
            .read()
            .await
            .active_chat
            .clone()
            .ok_or(ClientError::NoActiveConversation)?;

        let client_id = Uuid::new_v4().to_string();
        let mut confirmed = self.api.send_message(&chat_id, content, &client_id).await?;
        if confirmed.client_id.is_none() {
            confirmed.client_id = Some(client_id);
        }
        self.chat.write().await.apply_sent_message(&chat_id, confirmed.clone());
        Ok(confirmed)
    }

    // =========================================================
    // Notification operations
    // =========================================================

    /// Fetch all notifications for the current user and replace the local
    /// list.
    ///
    /// # Errors
    ///
    /// Request failures leave prior state intact.
    pub async fn fetch_notifications(&self) -> Result<(), ClientError> {
        let items = self.api.list_notifications(&self.user.id).await?;
        self.notifications.write().await.replace_all(items);
        Ok(())
    }

    /// Mark one notification read: persist (the request layer retries once
    /// after a silent refresh on 401), then flip the local flag.
    ///
    /// # Errors
    ///
    /// Request failures leave prior state intact.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ClientError> {
        let updated = self.api.mark_notification_read(id).await?;
        self.notifications.write().await.mark_read(&updated.id);
        Ok(())
    }

    /// Delete every held notification, one request per item, and clear the
    /// local list only after all deletes succeeded. Any failure leaves the
    /// local list untouched; a follow-up fetch reconciles partial deletes.
    ///
    /// # Errors
    ///
    /// The first failed delete.
    pub async fn clear_notifications(&self) -> Result<(), ClientError> {
        let ids: Vec<String> =
            self.notifications.read().await.items.iter().map(|n| n.id.clone()).collect();
        for id in &ids {
            self.api.delete_notification(id).await?;
        }
        self.notifications.write().await.clear();
        Ok(())
    }
}

/// Route one inbound event into the owning store. Presence events are
/// already applied by the socket manager and pass through untouched here.
pub(crate) async fn dispatch_event(
    user_id: &str,
    chat: &Arc<RwLock<ChatState>>,
    notifications: &Arc<RwLock<NotificationState>>,
    event: ServerEvent,
) {
    match event {
        ServerEvent::NewMessage { chat_id, message } => {
            chat.write().await.apply_new_message(user_id, &chat_id, message);
        }
        ServerEvent::MessageRead { chat_id, user_id: reader } => {
            chat.write().await.apply_message_read(user_id, &chat_id, &reader);
        }
        ServerEvent::NewNotification(notification) => {
            notifications.write().await.apply_push(notification);
        }
        ServerEvent::NotificationUpdated(notification) => {
            notifications.write().await.apply_update(notification);
        }
        ServerEvent::InitialOnlineUsers(_)
        | ServerEvent::UserConnected(_)
        | ServerEvent::UserDisconnected(_) => {}
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
