//! REST endpoints consumed by the session and store layers.
//!
//! ERROR HANDLING
//! ==============
//! Every authorized request obtains a fresh token first. A 401 response
//! triggers exactly one silent token refresh and one retry of the original
//! call; a second 401 surfaces as [`ClientError::AuthExpired`] and the caller
//! decides whether to force re-login. Other non-success statuses map to
//! [`ClientError::Api`] without retry.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net::types::{
    ChatMessage, Conversation, LoginRequest, LoginResponse, Notification, RefreshResponse,
};
use crate::session::token::{RefreshTransport, TokenManager};

/// Authenticate and obtain the initial session token.
///
/// # Errors
///
/// [`ClientError::Api`] on rejected credentials, [`ClientError::Http`] on
/// transport failure.
pub async fn login(
    http: &reqwest::Client,
    base_url: &str,
    credentials: &LoginRequest,
) -> Result<LoginResponse, ClientError> {
    let url = format!("{}/auth/login", base_url.trim_end_matches('/'));
    let response = http.post(url).json(credentials).send().await?;
    let value = into_json(response).await?;
    Ok(serde_json::from_value(value)?)
}

/// Refresh transport backed by `POST /auth/refresh-token`.
pub struct HttpRefresh {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRefresh {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }
}

#[async_trait::async_trait]
impl RefreshTransport for HttpRefresh {
    async fn refresh(&self, current: &str) -> Result<String, ClientError> {
        let url = format!("{}/auth/refresh-token", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "token": current }))
            .send()
            .await?;
        let value = into_json(response).await?;
        let body: RefreshResponse = serde_json::from_value(value)?;
        Ok(body.token)
    }
}

/// Typed REST client for the authenticated endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: &ClientConfig, http: reqwest::Client, tokens: Arc<TokenManager>) -> Self {
        Self { http, base_url: config.base_url.trim_end_matches('/').to_owned(), tokens }
    }

    /// End the session server-side.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.authorized(Method::POST, "/auth/logout", None).await?;
        Ok(())
    }

    /// List the current user's conversations.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        let value = self.authorized(Method::GET, "/chats", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Create (or fetch the existing) 1:1 conversation with another user.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn create_conversation(
        &self,
        other_user_id: &str,
    ) -> Result<Conversation, ClientError> {
        let body = serde_json::json!({ "participantId": other_user_id });
        let value = self.authorized(Method::POST, "/chats", Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Persist a message, returning the server-confirmed copy.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        client_id: &str,
    ) -> Result<ChatMessage, ClientError> {
        let path = format!("/chats/{chat_id}/messages");
        let body = serde_json::json!({ "content": content, "clientId": client_id });
        let value = self.authorized(Method::POST, &path, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// List all notifications for a user.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn list_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, ClientError> {
        let path = format!("/notifications/user/{user_id}");
        let value = self.authorized(Method::GET, &path, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Mark one notification as read, returning the updated copy.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn mark_notification_read(&self, id: &str) -> Result<Notification, ClientError> {
        let path = format!("/notifications/{id}/read");
        let value = self.authorized(Method::PUT, &path, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Delete one notification.
    ///
    /// # Errors
    ///
    /// See module docs.
    pub async fn delete_notification(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/notifications/{id}");
        self.authorized(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let token = self.tokens.ensure_fresh().await?;
        let response = self.send(method.clone(), path, body.as_ref(), &token.raw).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return into_json(response).await;
        }

        // One silent refresh, one retry of the original call.
        let token = self.tokens.refresh().await?;
        let retry = self.send(method, path, body.as_ref(), &token.raw).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthExpired);
        }
        into_json(retry).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url).bearer_auth(bearer);
        let request = if let Some(json) = body { request.json(json) } else { request };
        Ok(request.send().await?)
    }
}

async fn into_json(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(ClientError::Api { status: status.as_u16(), message: value.to_string() });
    }
    Ok(value)
}
