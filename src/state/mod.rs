//! Pure client-side state: connection/presence, conversations, and
//! notifications. Each struct is owned by exactly one component and mutated
//! only through its own methods; the network layers call in, never the
//! reverse.

pub mod chat;
pub mod connection;
pub mod notifications;

pub use chat::ChatState;
pub use connection::{ConnectionState, ConnectionStatus};
pub use notifications::NotificationState;
