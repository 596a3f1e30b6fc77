//! Admin API.
//!
//! Health state is supplied from outside the proxy; this API is how an
//! operator or external checker supplies it, and how the backend set is
//! replaced at runtime.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::load_balancer::LoadBalancer;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub balancer: Option<Arc<dyn LoadBalancer>>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(balancer: Option<Arc<dyn LoadBalancer>>, api_key: &str) -> Self {
        Self {
            balancer,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends).put(put_backends))
        .route("/admin/backends/health", post(post_health))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
