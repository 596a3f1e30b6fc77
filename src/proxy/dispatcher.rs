//! The dispatcher: picks a destination for each inbound request and forwards it.
//!
//! # Responsibilities
//! - Select the target (load balancer first, static address otherwise)
//! - Rewrite the request for the chosen backend
//! - Forward over the upstream client, streaming the response back
//! - Log before and after the forward
//!
//! # Design Decisions
//! - Dropping the `dispatch` future (caller went away) drops the in-flight
//!   upstream request, so a cancelled forward never writes to the caller
//! - The response body is streamed, never buffered
//! - The registry's backend address is only borrowed; rewrites build new values

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Version};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::{ConfigError, ProxyConfig};
use crate::load_balancer::{Backend, LoadBalancer};
use crate::proxy::capture::StatusCapture;
use crate::proxy::headers;
use crate::proxy::DispatchError;

/// HTTP client used for forwarding.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Build the upstream client from externally configured limits.
pub fn upstream_client(
    dial_timeout: Duration,
    idle_timeout: Duration,
    max_idle_per_host: usize,
) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(dial_timeout));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(idle_timeout)
        .pool_max_idle_per_host(max_idle_per_host)
        .build(connector)
}

/// Where a request is sent.
enum Destination<'a> {
    Pool(Arc<Backend>),
    Fixed(&'a Url),
}

impl Destination<'_> {
    fn url(&self) -> &Url {
        match self {
            Destination::Pool(backend) => backend.url(),
            Destination::Fixed(url) => url,
        }
    }
}

/// Forwards inbound requests to a backend.
pub struct Dispatcher {
    target: Option<Url>,
    balancer: Option<Arc<dyn LoadBalancer>>,
    client: UpstreamClient,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Create a dispatcher. A balancer, when present, takes precedence over
    /// the static target.
    pub fn new(
        target: Option<Url>,
        balancer: Option<Arc<dyn LoadBalancer>>,
        client: UpstreamClient,
    ) -> Self {
        Self {
            target,
            balancer,
            client,
            timeout: None,
        }
    }

    /// Bound the wait for the backend's response head.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a dispatcher, its balancer and its client from configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let target = config.target_url()?;
        let balancer = config.create_load_balancer()?;
        let client = upstream_client(
            config.proxy.dial_timeout(),
            config.server.idle_timeout(),
            config.proxy.max_idle_conns,
        );

        if balancer.is_none() && target.is_none() {
            tracing::warn!("No target address or load balancer configured; every request will be rejected");
        }

        Ok(Self::new(target, balancer, client).with_timeout(config.server.write_timeout()))
    }

    pub fn balancer(&self) -> Option<&Arc<dyn LoadBalancer>> {
        self.balancer.as_ref()
    }

    pub fn target(&self) -> Option<&Url> {
        self.target.as_ref()
    }

    fn select(&self) -> Result<Destination<'_>, DispatchError> {
        match (&self.balancer, &self.target) {
            (Some(balancer), _) => Ok(Destination::Pool(balancer.next_backend()?)),
            (None, Some(target)) => Ok(Destination::Fixed(target)),
            (None, None) => Err(DispatchError::MisconfiguredDispatch),
        }
    }

    /// Handle one inbound request and produce the caller's response.
    pub async fn dispatch(&self, request: Request<Body>, client_addr: Option<SocketAddr>) -> Response {
        let destination = match self.select() {
            Ok(destination) => destination,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    method = %request.method(),
                    path = %request.uri().path(),
                    "Failed to select backend"
                );
                return err.into_response();
            }
        };
        let backend = destination.url();

        let (mut parts, body) = request.into_parts();
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let original_host = headers::original_host(&parts);
        let remote_addr = client_addr.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());

        let uri = match headers::backend_uri(backend, &parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                let err = DispatchError::from(e);
                tracing::error!(error = %err, backend = %backend, "Failed to rewrite request");
                return err.into_response();
            }
        };

        headers::strip_hop_by_hop(&mut parts.headers);
        if let Some(host) = original_host {
            parts.headers.insert(headers::X_FORWARDED_HOST, host);
        }
        if let Some(addr) = client_addr {
            headers::append_forwarded_for(&mut parts.headers, addr.ip());
        }
        if let Some(host) = headers::backend_authority(backend).and_then(|h| HeaderValue::from_str(&h).ok()) {
            parts.headers.insert(header::HOST, host);
        }
        parts.uri = uri;
        // The pooled upstream connections speak HTTP/1.1 regardless of the inbound version.
        parts.version = Version::HTTP_11;

        tracing::info!(
            method = %parts.method,
            url = %parts.uri,
            backend = %backend,
            remote_addr = %remote_addr,
            user_agent = %user_agent,
            "Incoming request"
        );

        let start = Instant::now();
        let capture = StatusCapture::new();
        let outbound = Request::from_parts(parts, body);

        let result: Result<Response<Incoming>, DispatchError> = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.client.request(outbound)).await {
                Ok(result) => result.map_err(DispatchError::from),
                Err(_) => Err(DispatchError::Timeout(limit)),
            },
            None => self.client.request(outbound).await.map_err(DispatchError::from),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let (mut parts, body) = capture.observe(response).into_parts();
                headers::strip_hop_by_hop(&mut parts.headers);

                tracing::info!(
                    status = capture.status().as_u16(),
                    backend = %backend,
                    duration_ms,
                    "Response received"
                );
                Response::from_parts(parts, Body::new(body))
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    backend = %backend,
                    duration_ms,
                    "Upstream request failed"
                );
                capture.observe(err.into_response())
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("target", &self.target.as_ref().map(Url::as_str))
            .field("balancer", &self.balancer)
            .field("timeout", &self.timeout)
            .finish()
    }
}
