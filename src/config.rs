//! Client configuration.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::error::ClientError;

/// Fraction of a token's lifetime after which it is treated as stale.
pub const REFRESH_THRESHOLD: f64 = 0.75;

/// Base delay between realtime reconnect attempts (doubled per failure).
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Consecutive connect failures after which the connection task gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Tunables for a [`crate::Client`] session.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP base URL of the backend, e.g. `https://api.guestcode.io`.
    pub base_url: String,
    /// Base delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Reconnect attempt ceiling.
    pub max_reconnect_attempts: u32,
    /// Token staleness threshold as a fraction of lifetime.
    pub refresh_threshold: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_owned(),
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            refresh_threshold: REFRESH_THRESHOLD,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: f64) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Derive the realtime websocket URL from the HTTP base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] when the base URL does not
    /// start with `http://` or `https://`.
    pub fn ws_url(&self) -> Result<String, ClientError> {
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("http://") {
            return Ok(format!("ws://{rest}/ws"));
        }
        if let Some(rest) = base.strip_prefix("https://") {
            return Ok(format!("wss://{rest}/ws"));
        }

        Err(ClientError::InvalidBaseUrl(self.base_url.clone()))
    }
}
