//! Mongolink Library
//!
//! Connection lifecycle management for MongoDB-backed services.
//!
//! Opens a single MongoDB connection from environment-driven configuration,
//! wires driver connection events (transport errors, disconnects) to log
//! output, and closes the connection gracefully when the process receives a
//! termination signal.

pub mod config;
pub mod connection;
pub mod errors;
pub mod shutdown;

pub use config::Config;
pub use connection::{ConnectionInfo, ConnectionManager, ConnectionState};
pub use errors::ConnectionError;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the binary and configuration layers
pub type Result<T> = anyhow::Result<T>;
