//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router whose every route is the proxy handler
//! - Wire up middleware (tracing)
//! - Serve on a listener with graceful shutdown
//! - Apply backend list changes from config reloads

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, ProxyConfig};
use crate::load_balancer::{self, Algorithm};
use crate::proxy::Dispatcher;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Create a server around an existing dispatcher.
    pub fn with_dispatcher(config: ProxyConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState {
            dispatcher: dispatcher.clone(),
        };
        Self {
            router: Self::build_router(state),
            config,
            dispatcher,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving or driving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves. Configs received on `config_updates` refresh
    /// the balancer's backend list.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            load_balancing = self.dispatcher.balancer().is_some(),
            "HTTP server starting"
        );

        let dispatcher = self.dispatcher.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config_update(&dispatcher, &config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.dispatcher.dispatch(request, client_addr).await
}

/// Replace the balancer's backends with those of a reloaded config.
///
/// Only the backend list is reloadable. Returns whether the update was applied.
pub fn apply_config_update(dispatcher: &Dispatcher, config: &ProxyConfig) -> bool {
    let Some(balancer) = dispatcher.balancer() else {
        tracing::warn!("Load balancing was not enabled at startup; ignoring reloaded backends");
        return false;
    };

    let lb = &config.load_balancing;
    if !lb.enabled {
        tracing::warn!("Load balancing cannot be disabled at runtime; ignoring reloaded config");
        return false;
    }
    match lb.algorithm.parse::<Algorithm>() {
        Ok(algorithm) if algorithm == balancer.algorithm() => {}
        _ => {
            tracing::warn!(
                current = %balancer.algorithm(),
                requested = %lb.algorithm,
                "Load balancing algorithm cannot change at runtime; ignoring reloaded config"
            );
            return false;
        }
    }

    match load_balancer::parse_backends(&lb.backends) {
        Ok(backends) => {
            balancer.update_backends(backends);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Reloaded backend list rejected");
            false
        }
    }
}
