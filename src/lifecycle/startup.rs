//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the dispatcher and balancer from a validated configuration
//! - Start the config watcher and admin API when requested
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: invalid addresses or a failed bind abort startup
//! - A config watcher that cannot start only disables hot reload
//! - Listeners start last (traffic only when ready)

use std::path::Path;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::{self, AdminState};
use crate::config::watcher::ConfigWatcher;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};

/// Errors that prevent the proxy from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Run the proxy until `shutdown` is triggered or a termination signal arrives.
///
/// When `watch_path` is given, edits to that file refresh the backend list.
pub async fn start(
    config: ProxyConfig,
    watch_path: Option<&Path>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let server = HttpServer::new(config.clone())?;

    let (_watcher, config_updates) = match watch_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, path = ?path, "Config watcher unavailable; hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let admin_task = if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let state = AdminState::new(server.dispatcher().balancer().cloned(), &config.admin.api_key);
        Some(tokio::spawn(admin::serve(listener, state, shutdown.signal())))
    } else {
        None
    };

    let listener = bind(&config.server.listen_addr).await?;
    let server_shutdown = shutdown.signal();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let result = server.run(listener, config_updates, server_shutdown).await;
    // Stop the admin API too if the proxy server ended on its own.
    shutdown.trigger();

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }

    result.map_err(StartupError::from)
}
