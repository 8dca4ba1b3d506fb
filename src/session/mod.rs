//! Session token lifecycle: durable storage, staleness prediction, and
//! coalesced refresh.

pub mod store;
pub mod token;

pub use store::{MemoryTokenStore, TokenStore};
pub use token::{RefreshTransport, SessionToken, TokenManager};
