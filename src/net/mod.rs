//! Network layer: REST endpoints, wire models, and the realtime connection.

pub mod api;
pub mod socket;
pub mod types;
