//! # guestcode-client
//!
//! Session and realtime coordination client for the GuestCode event
//! platform. Owns the token lifecycle (proactive refresh with coalesced
//! in-flight requests), the single realtime connection with bounded
//! reconnect backoff and presence tracking, and the local chat and
//! notification state merged from REST responses and realtime pushes.
//!
//! The [`client::Client`] facade ties the pieces together per authenticated
//! session; the layers underneath are usable on their own.

pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod session;
pub mod state;

pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;
