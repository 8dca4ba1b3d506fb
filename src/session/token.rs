//! Access-token lifecycle management.
//!
//! DESIGN
//! ======
//! The manager guarantees callers a non-stale token without redundant
//! network traffic: staleness is predicted from the token's own `iat`/`exp`
//! claims at a 0.75-of-lifetime threshold, and concurrent `refresh` callers
//! share a single in-flight future. Silent replacements are announced on a
//! broadcast channel so the realtime connection and request layer can react.

#[cfg(test)]
#[path = "token_test.rs"]
mod token_test;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::session::store::TokenStore;

type SharedRefresh = Shared<BoxFuture<'static, Result<SessionToken, Arc<ClientError>>>>;

/// Network half of a token refresh. Production uses
/// [`crate::net::api::HttpRefresh`]; tests substitute counting mocks.
#[async_trait::async_trait]
pub trait RefreshTransport: Send + Sync {
    /// Exchange the current token for a fresh one, returning the new raw
    /// token string.
    async fn refresh(&self, current: &str) -> Result<String, ClientError>;
}

/// Claims carried in the token payload. Only the timing claims matter here.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    iat: i64,
    exp: i64,
}

/// A decoded session token. Replaced wholesale on each refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionToken {
    /// The encoded token string as sent on the wire.
    pub raw: String,
    /// Issued-at, seconds since the Unix epoch.
    pub issued_at: i64,
    /// Expiry, seconds since the Unix epoch.
    pub expires_at: i64,
}

impl SessionToken {
    /// Decode a `header.payload.signature` token, reading `iat` and `exp`
    /// from the base64url JSON payload. The signature is not verified; the
    /// client only needs the timing claims.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedToken`] for anything undecodable.
    pub fn decode(raw: &str) -> Result<Self, ClientError> {
        let payload = raw
            .split('.')
            .nth(1)
            .ok_or_else(|| ClientError::MalformedToken("missing payload segment".to_owned()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|error| ClientError::MalformedToken(error.to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&bytes)
            .map_err(|error| ClientError::MalformedToken(error.to_string()))?;

        Ok(Self { raw: raw.to_owned(), issued_at: claims.iat, expires_at: claims.exp })
    }

    /// Token lifetime in seconds.
    #[must_use]
    pub fn lifetime(&self) -> i64 {
        self.expires_at - self.issued_at
    }

    /// The instant (seconds since epoch) at which the token counts as stale:
    /// `issued_at + lifetime * threshold`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn refresh_at(&self, threshold: f64) -> i64 {
        self.issued_at + (self.lifetime() as f64 * threshold) as i64
    }

    /// True iff `now` has reached the staleness threshold (boundary
    /// inclusive).
    #[must_use]
    pub fn is_expired_or_near_expiry(&self, now: i64, threshold: f64) -> bool {
        now >= self.refresh_at(threshold)
    }
}

/// Owns the access-token refresh schedule and the fresh-token guarantee.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn RefreshTransport>,
    threshold: f64,
    inflight: Mutex<Option<SharedRefresh>>,
    refreshed: broadcast::Sender<SessionToken>,
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl TokenManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn RefreshTransport>,
        threshold: f64,
    ) -> Self {
        let (refreshed, _) = broadcast::channel(16);
        Self {
            store,
            transport,
            threshold,
            inflight: Mutex::new(None),
            refreshed,
            schedule: Mutex::new(None),
        }
    }

    /// Store a token obtained outside the refresh path (login response).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedToken`] when the token is undecodable.
    pub fn set_token(&self, raw: &str) -> Result<SessionToken, ClientError> {
        let token = SessionToken::decode(raw)?;
        self.store.save(raw);
        Ok(token)
    }

    /// The currently stored token, decoded. `None` when absent or malformed.
    #[must_use]
    pub fn current(&self) -> Option<SessionToken> {
        let raw = self.store.load()?;
        SessionToken::decode(&raw).ok()
    }

    /// Subscribe to silent token replacements.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionToken> {
        self.refreshed.subscribe()
    }

    /// Return the current token if it is not near expiry, refreshing
    /// otherwise. A malformed stored token is treated as stale.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoToken`] when no token is stored, or the refresh
    /// failure when a refresh was required and failed.
    pub async fn ensure_fresh(self: &Arc<Self>) -> Result<SessionToken, ClientError> {
        let Some(raw) = self.store.load() else {
            return Err(ClientError::NoToken);
        };
        match SessionToken::decode(&raw) {
            Ok(token) if !token.is_expired_or_near_expiry(now_secs(), self.threshold) => Ok(token),
            _ => self.refresh().await,
        }
    }

    /// Refresh the token, coalescing concurrent callers onto a single
    /// network call. All waiters receive the same resolved token (or the
    /// same failure).
    ///
    /// # Errors
    ///
    /// [`ClientError::RefreshFailed`] wrapping the shared underlying cause.
    /// No automatic retry; retry policy belongs to the caller.
    pub async fn refresh(self: &Arc<Self>) -> Result<SessionToken, ClientError> {
        let fut = {
            let mut inflight = lock(&self.inflight);
            if let Some(fut) = inflight.as_ref() {
                fut.clone()
            } else {
                let manager = Arc::clone(self);
                let fut: SharedRefresh = async move {
                    let result = manager.refresh_once().await.map_err(Arc::new);
                    *lock(&manager.inflight) = None;
                    result
                }
                .boxed()
                .shared();
                *inflight = Some(fut.clone());
                fut
            }
        };

        fut.await.map_err(ClientError::RefreshFailed)
    }

    async fn refresh_once(&self) -> Result<SessionToken, ClientError> {
        let current = self.store.load().unwrap_or_default();
        let raw = self.transport.refresh(&current).await?;
        let token = SessionToken::decode(&raw)?;
        self.store.save(&raw);
        let _ = self.refreshed.send(token.clone());
        Ok(token)
    }

    /// Arm the proactive refresh schedule: sleep until the staleness
    /// threshold, refresh, re-arm. No stored token means no-op; a failed
    /// background refresh logs and disarms (the next foreground call
    /// surfaces the error to a real caller).
    pub fn spawn_refresh_schedule(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let Some(raw) = manager.store.load() else {
                    return;
                };
                let wait = match SessionToken::decode(&raw) {
                    Ok(token) => {
                        let remaining = token.refresh_at(manager.threshold) - now_secs();
                        Duration::from_secs(u64::try_from(remaining).unwrap_or(0))
                    }
                    // Malformed token: refresh immediately.
                    Err(_) => Duration::ZERO,
                };
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                if let Err(error) = manager.refresh().await {
                    tracing::warn!(%error, "scheduled token refresh failed");
                    return;
                }
            }
        });
        if let Some(previous) = lock(&self.schedule).replace(handle) {
            previous.abort();
        }
    }

    /// Disarm the proactive refresh schedule.
    pub fn cancel_refresh_schedule(&self) {
        if let Some(handle) = lock(&self.schedule).take() {
            handle.abort();
        }
    }

    /// Run the staleness check immediately. Called by the host when the
    /// application returns to the foreground, covering long-backgrounded
    /// sessions where the scheduled timer did not fire.
    pub async fn notify_visible(self: &Arc<Self>) {
        let Some(raw) = self.store.load() else {
            return;
        };
        let stale = SessionToken::decode(&raw)
            .map_or(true, |token| token.is_expired_or_near_expiry(now_secs(), self.threshold));
        if stale {
            if let Err(error) = self.refresh().await {
                tracing::warn!(%error, "visibility-triggered refresh failed");
            }
        }
    }

    /// Drop the stored token and disarm the schedule. Called on logout.
    pub fn clear(&self) {
        self.cancel_refresh_schedule();
        self.store.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Current time in seconds since the Unix epoch.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| i64::try_from(duration.as_secs()).unwrap_or(0))
}
