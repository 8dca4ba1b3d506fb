//! Durable client-side token storage.
//!
//! The host application decides where tokens live (encrypted cookie jar,
//! keychain, plain memory); the token manager only needs load/save/clear.

use std::sync::Mutex;

/// Storage for the current access token.
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any.
    fn load(&self) -> Option<String>;
    /// Replace the stored token wholesale.
    fn save(&self, raw: &str);
    /// Remove the stored token.
    fn clear(&self);
}

/// In-memory store; the default for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new(raw: Option<String>) -> Self {
        Self { slot: Mutex::new(raw) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn save(&self, raw: &str) {
        *self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(raw.to_owned());
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}
