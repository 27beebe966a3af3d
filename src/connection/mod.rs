//! Connection Management Module
//!
//! Owns the single MongoDB connection and its lifecycle.

pub mod events;
pub mod manager;
pub mod state;

pub use events::{ConnectionEvent, EventRegistry};
pub use manager::{ConnectionInfo, ConnectionManager};
pub use state::ConnectionState;
