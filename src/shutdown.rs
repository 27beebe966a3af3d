//! Graceful Shutdown Handling
//!
//! This module provides utilities for handling graceful shutdown of the
//! connection manager. It supports SIGTERM and SIGINT signals and ensures
//! the database connection is closed cleanly before the process exits.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{broadcast, Notify};
use tracing::{info, warn};

use crate::connection::ConnectionManager;
use crate::errors::ConnectionError;
use crate::Result;

/// Shutdown coordinator that manages the graceful shutdown process
pub struct ShutdownCoordinator {
    /// Broadcast sender for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Notification for shutdown completion
    shutdown_complete: Arc<Notify>,
    /// Shutdown timeout duration
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_complete = Arc::new(Notify::new());

        Self {
            shutdown_tx,
            shutdown_complete,
            timeout,
        }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Get a handle to wait for shutdown completion
    pub fn completion_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown_complete)
    }

    /// Listen for termination signals (SIGTERM, SIGINT), returning once one
    /// arrives. Subscribers are notified before this returns.
    pub async fn listen_for_signals(&self) -> Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("No shutdown subscribers to notify: {}", e);
        }

        Ok(())
    }

    /// Close the database connection exactly once. The completion handle is
    /// notified whether or not the close succeeded; the result decides the
    /// process exit status.
    pub async fn shutdown(&self, manager: &ConnectionManager) -> std::result::Result<(), ConnectionError> {
        info!("Closing MongoDB connection");
        let result = manager.close().await;
        self.shutdown_complete.notify_waiters();
        result
    }

    /// Wait for shutdown completion with timeout
    pub async fn wait_for_completion(&self) -> Result<()> {
        tokio::time::timeout(
            self.timeout + Duration::from_secs(5),
            self.shutdown_complete.notified(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Shutdown completion timeout"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_shutdown_coordinator_creation() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let _receiver = coordinator.subscribe();
        let _completion = coordinator.completion_handle();
    }

    #[tokio::test]
    async fn test_shutdown_signal_broadcast() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let mut receiver = coordinator.subscribe();

        coordinator.shutdown_tx.send(()).unwrap();

        assert!(receiver.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_without_open_connection_reports_error() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));

        let mut config = Config::default();
        config.database.uri = Some("mongodb://localhost:27017".to_string());
        let manager = ConnectionManager::new(Arc::new(config));

        let result = coordinator.shutdown(&manager).await;
        assert!(matches!(result, Err(ConnectionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_shutdown_notifies_completion_waiters() {
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(5)));

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.wait_for_completion().await })
        };

        // Give the waiter a moment to register before notifying
        sleep(Duration::from_millis(50)).await;

        let mut config = Config::default();
        config.database.uri = Some("mongodb://localhost:27017".to_string());
        let manager = ConnectionManager::new(Arc::new(config));

        // Close fails (never connected) but completion is still notified
        let _ = coordinator.shutdown(&manager).await;

        assert!(waiter.await.unwrap().is_ok());
    }
}
