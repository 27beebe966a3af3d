use std::time::Duration;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors produced while opening, watching, or closing the MongoDB connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("connection string is not configured (set MONGODB_URI)")]
    MissingConnectionString,

    #[error("invalid connection string: {source}")]
    InvalidConnectionString {
        #[source]
        source: mongodb::error::Error,
    },

    #[error("failed to reach MongoDB: {source}")]
    Handshake {
        #[source]
        source: mongodb::error::Error,
    },

    #[error("connection is not open")]
    NotConnected,

    #[error("connection close did not finish within {timeout:?}")]
    CloseTimeout { timeout: Duration },

    #[error("invalid connection state transition: {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}
