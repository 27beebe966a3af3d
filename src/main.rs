//! Mongolink - MongoDB connection lifecycle manager
//!
//! Opens a single MongoDB connection at startup, logs connection-lifecycle
//! events, and closes the connection gracefully on SIGINT/SIGTERM.
//!
//! Configuration priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Built-in defaults
//!
//! Environment variables:
//!   MONGODB_URI                - MongoDB connection string (required)
//!   MONGOLINK_APP_NAME         - Application name reported to the server
//!   MONGOLINK_CONNECT_TIMEOUT  - Handshake timeout (e.g. 10s, 1m)
//!   MONGOLINK_SHUTDOWN_TIMEOUT - Close timeout (e.g. 30s)
//!   MONGOLINK_LOG_LEVEL        - Log level (trace, debug, info, warn, error)
//!   RUST_LOG                   - Tracing filter override

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mongolink::{config::ConfigManager, ConnectionManager, ShutdownCoordinator};

/// CLI arguments for mongolink
#[derive(Parser, Debug)]
#[command(name = "mongolink")]
#[command(about = "MongoDB connection lifecycle manager")]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "mongolink.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Connection string (overrides MONGODB_URI)
    #[arg(long, help = "MongoDB connection string (overrides MONGODB_URI)")]
    pub uri: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() {
    // Pick up a local .env before anything reads the environment
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    if let Err(e) = init_tracing(&args) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting mongolink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if args.validate_config {
        info!("Configuration is valid");
        info!("Configuration summary:");
        info!("  Connection string: {}", config.database.redacted_uri());
        info!("  App name: {}", config.database.app_name);
        info!("  Connect timeout: {:?}", config.database.connect_timeout);
        info!("  Shutdown timeout: {:?}", config.database.shutdown_timeout);
        info!("  Log level: {}", config.monitoring.log_level);
        return;
    }

    let shutdown_timeout = config.database.shutdown_timeout;
    let manager = ConnectionManager::new(Arc::new(config));

    // Gate startup on the handshake; the application cannot run without
    // this dependency, so a failure here is fatal.
    if let Err(e) = manager.connect().await {
        error!("Error connecting to MongoDB: {}", e);
        std::process::exit(1);
    }

    let shutdown_coordinator = ShutdownCoordinator::new(shutdown_timeout);

    info!("mongolink running; press Ctrl+C or send SIGTERM/SIGINT to shut down");

    if let Err(e) = shutdown_coordinator.listen_for_signals().await {
        error!("Error setting up signal handlers: {}", e);
        std::process::exit(1);
    }

    match shutdown_coordinator.shutdown(&manager).await {
        Ok(()) => {
            info!("MongoDB connection closed through app termination");
            std::process::exit(0);
        }
        Err(e) => {
            error!("Error during MongoDB connection closure: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load and validate configuration with priority: CLI > environment > file
fn load_config(args: &CliArgs) -> Result<mongolink::Config> {
    let mut config = ConfigManager::load_from_file(&args.config)?;
    ConfigManager::apply_env_overrides(&mut config)?;
    config.merge_with_cli_args(args.uri.as_deref(), args.log_level.as_deref());
    config.validate()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug".to_string()
    } else if let Some(level) = &args.log_level {
        level.clone()
    } else {
        std::env::var("MONGOLINK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
