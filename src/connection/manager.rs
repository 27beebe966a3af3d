//! Connection Manager Implementation

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use mongodb::bson::doc;
use mongodb::event::cmap::CmapEvent;
use mongodb::event::sdam::SdamEvent;
use mongodb::event::EventHandler;
use mongodb::options::ClientOptions;
use mongodb::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::events::{ConnectionEvent, EventRegistry};
use crate::connection::state::ConnectionState;
use crate::errors::ConnectionError;

/// Connection metadata captured once the handshake completes
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub hosts: Vec<String>,
    pub app_name: String,
    pub connected_at: Instant,
}

impl ConnectionInfo {
    /// Display form of the backend host(s)
    pub fn host(&self) -> String {
        self.hosts.join(",")
    }
}

/// Manages the single MongoDB connection and its lifecycle.
///
/// At most one connection is live per manager. The manager is owned by the
/// application composition root and shared from there; it is not a global.
pub struct ConnectionManager {
    config: Arc<Config>,
    state: RwLock<ConnectionState>,
    client: Mutex<Option<Client>>,
    events: Arc<EventRegistry>,
}

impl ConnectionManager {
    /// Create a new ConnectionManager with the log-only default event
    /// handlers installed.
    pub fn new(config: Arc<Config>) -> Self {
        let events = Arc::new(EventRegistry::new());
        events.install_default_loggers();

        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            client: Mutex::new(None),
            events,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the handshake has completed and the connection is live
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Event registry, for embedders that wire their own observers
    pub fn events(&self) -> &Arc<EventRegistry> {
        &self.events
    }

    /// Register a callback for post-connect transport errors. Log-only at
    /// this layer; recovery stays inside the driver.
    pub fn on_connection_error<F>(&self, handler: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.events.on_connection_error(handler);
    }

    /// Register a callback for disconnect notices
    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.events.on_disconnected(handler);
    }

    /// Open the connection and wait for the server handshake to complete.
    ///
    /// Expected to be called once per process lifetime. On failure the
    /// manager is left in the `error` state and the caller decides the
    /// process's fate (the binary fails fast and exits non-zero).
    pub async fn connect(&self) -> Result<ConnectionInfo, ConnectionError> {
        self.set_state(ConnectionState::Connecting)?;

        match self.dial().await {
            Ok(info) => {
                self.set_state(ConnectionState::Connected)?;
                info!("MongoDB connected: {}", info.host());
                Ok(info)
            }
            Err(err) => {
                self.set_state(ConnectionState::Error)?;
                Err(err)
            }
        }
    }

    async fn dial(&self) -> Result<ConnectionInfo, ConnectionError> {
        let database = &self.config.database;
        let uri = database
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(ConnectionError::MissingConnectionString)?;

        debug!("Resolving connection string {}", database.redacted_uri());
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| ConnectionError::InvalidConnectionString { source })?;

        options.app_name = Some(database.app_name.clone());
        options.connect_timeout = Some(database.connect_timeout);
        options.server_selection_timeout = Some(database.connect_timeout);
        options.sdam_event_handler = Some(self.sdam_handler());
        options.cmap_event_handler = Some(self.cmap_handler());

        let hosts: Vec<String> = options.hosts.iter().map(|host| host.to_string()).collect();

        let client = Client::with_options(options)
            .map_err(|source| ConnectionError::InvalidConnectionString { source })?;

        // The driver connects lazily; ping so startup fails here rather
        // than on first use.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| ConnectionError::Handshake { source })?;

        *self.client.lock().await = Some(client);

        Ok(ConnectionInfo {
            hosts,
            app_name: database.app_name.clone(),
            connected_at: Instant::now(),
        })
    }

    /// Close the connection, waiting for the driver to release its
    /// resources. Bounded by the configured shutdown timeout.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        let client = self
            .client
            .lock()
            .await
            .take()
            .ok_or(ConnectionError::NotConnected)?;

        self.set_state(ConnectionState::Closing)?;

        let timeout = self.config.database.shutdown_timeout;
        tokio::time::timeout(timeout, async move { client.shutdown().await })
            .await
            .map_err(|_| ConnectionError::CloseTimeout { timeout })?;

        self.set_state(ConnectionState::Closed)?;
        debug!("MongoDB client shutdown complete");
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) -> Result<(), ConnectionError> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .transition(next)
    }

    fn sdam_handler(&self) -> EventHandler<SdamEvent> {
        let events = Arc::clone(&self.events);
        EventHandler::callback(move |event: SdamEvent| match event {
            SdamEvent::ServerHeartbeatFailed(ev) => {
                events.dispatch(&ConnectionEvent::TransportError {
                    message: ev.failure.to_string(),
                });
            }
            SdamEvent::ServerClosed(ev) => {
                events.dispatch(&ConnectionEvent::Disconnected {
                    address: ev.address.to_string(),
                });
            }
            _ => {}
        })
    }

    fn cmap_handler(&self) -> EventHandler<CmapEvent> {
        let events = Arc::clone(&self.events);
        EventHandler::callback(move |event: CmapEvent| {
            if let CmapEvent::PoolCleared(ev) = event {
                events.dispatch(&ConnectionEvent::Disconnected {
                    address: ev.address.to_string(),
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager_with_uri(uri: Option<&str>) -> ConnectionManager {
        let mut config = Config::default();
        config.database.uri = uri.map(str::to_string);
        ConnectionManager::new(Arc::new(config))
    }

    #[test]
    fn test_new_manager_starts_disconnected() {
        let manager = manager_with_uri(Some("mongodb://localhost:27017"));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_connect_without_uri_fails_before_dialing() {
        let manager = manager_with_uri(None);
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::MissingConnectionString));
        assert_eq!(manager.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_connect_with_hostless_uri_fails_to_parse() {
        let manager = manager_with_uri(Some("mongodb://"));
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::InvalidConnectionString { .. }
        ));
        assert_eq!(manager.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_close_before_connect_is_an_error() {
        let manager = manager_with_uri(Some("mongodb://localhost:27017"));
        let err = manager.close().await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotConnected));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_registered_handlers_observe_dispatched_events() {
        let manager = manager_with_uri(Some("mongodb://localhost:27017"));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        manager.on_connection_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.events().dispatch(&ConnectionEvent::TransportError {
            message: "heartbeat failed".to_string(),
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Log-only: the manager's state is untouched by events
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connection_info_host_display() {
        let info = ConnectionInfo {
            hosts: vec!["db1:27017".to_string(), "db2:27017".to_string()],
            app_name: "mongolink".to_string(),
            connected_at: Instant::now(),
        };
        assert_eq!(info.host(), "db1:27017,db2:27017");
    }
}
