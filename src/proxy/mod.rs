//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (from http::server)
//!     → dispatcher.rs (select target: balancer or static address)
//!     → headers.rs (rewrite URI, Host, X-Forwarded-*, strip hop-by-hop)
//!     → upstream client (streamed request/response)
//!     → capture.rs (record status for logging)
//!     → Response to caller
//! ```
//!
//! # Design Decisions
//! - Stateless between requests; durable state lives in the load balancer
//! - Every per-request failure becomes an HTTP response, never a crash
//! - No retries: a failed forward is reported to the caller as-is

pub mod capture;
pub mod dispatcher;
pub mod headers;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;

use crate::load_balancer::LoadBalancerError;

pub use capture::StatusCapture;
pub use dispatcher::{upstream_client, Dispatcher, UpstreamClient};

/// Per-request dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The balancer has no healthy backend to offer.
    #[error("no healthy backends available")]
    NoHealthyBackends,
    /// Neither a balancer nor a static target is configured.
    #[error("no backend or load balancer configured")]
    MisconfiguredDispatch,
    /// The request could not be rewritten for the backend.
    #[error("failed to build upstream request: {0}")]
    Rewrite(#[from] axum::http::Error),
    /// Connecting to or exchanging with the backend failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    /// The backend did not answer within the configured deadline.
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// Status code returned to the caller for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoHealthyBackends | DispatchError::MisconfiguredDispatch => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DispatchError::Rewrite(_) | DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<LoadBalancerError> for DispatchError {
    fn from(err: LoadBalancerError) -> Self {
        match err {
            LoadBalancerError::NoHealthyBackends => DispatchError::NoHealthyBackends,
            // Unknown algorithms are rejected before a dispatcher exists.
            LoadBalancerError::UnknownAlgorithm(_) => DispatchError::MisconfiguredDispatch,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}
