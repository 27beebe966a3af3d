//! Connection event observers
//!
//! The driver reports transport faults and disconnects on its own callback
//! context. This module converts those into domain events and fans them out
//! to registered handlers. Handlers must not block; the defaults only log.

use std::sync::{PoisonError, RwLock};
use tracing::{error, warn};

/// A connection-lifecycle event reported by the driver after the initial
/// handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Asynchronous transport fault, e.g. a failed server heartbeat
    TransportError { message: String },
    /// The driver tore down a server connection or cleared its pool
    Disconnected { address: String },
}

type EventCallback = Box<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Registry of connection event handlers
#[derive(Default)]
pub struct EventRegistry {
    error_handlers: RwLock<Vec<EventCallback>>,
    disconnect_handlers: RwLock<Vec<EventCallback>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for post-connect transport errors
    pub fn on_connection_error<F>(&self, handler: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.error_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Register a callback for disconnect notices
    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.disconnect_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Invoke every handler registered for this event's kind, once each.
    pub fn dispatch(&self, event: &ConnectionEvent) {
        let handlers = match event {
            ConnectionEvent::TransportError { .. } => &self.error_handlers,
            ConnectionEvent::Disconnected { .. } => &self.disconnect_handlers,
        };

        let handlers = handlers.read().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(event);
        }
    }

    /// Install the log-only default handlers. Errors and disconnects are
    /// logged and otherwise left to the driver's own recovery.
    pub fn install_default_loggers(&self) {
        self.on_connection_error(|event| {
            if let ConnectionEvent::TransportError { message } = event {
                error!("MongoDB connection error: {}", message);
            }
        });

        self.on_disconnected(|event| {
            if let ConnectionEvent::Disconnected { address } = event {
                warn!("MongoDB disconnected: {}", address);
            }
        });
    }
}
