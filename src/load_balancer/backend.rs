//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server by its normalized address
//! - Track health state (Healthy/Unhealthy), toggled from outside
//! - Define backend identity as equality of normalized address strings

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

/// Error type for backend construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The address could not be parsed into scheme + host form.
    #[error("invalid backend address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Parse and normalize a server address.
///
/// The result always carries a scheme and a host. Upstream TLS is not
/// supported, so only `http` addresses are accepted.
pub fn parse_address(raw: &str) -> Result<Url, BackendError> {
    let invalid = |reason: String| BackendError::InvalidAddress {
        address: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    match url.scheme() {
        "http" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Normalized address of the backend.
    url: Url,
    /// Current health flag.
    healthy: AtomicBool,
}

impl Backend {
    /// Create a healthy backend from an address string.
    pub fn parse(address: &str) -> Result<Self, BackendError> {
        Ok(Self::new(parse_address(address)?, true))
    }

    /// Create a backend from an already parsed address.
    pub fn new(url: Url, healthy: bool) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(healthy),
        }
    }

    /// The backend's address. Callers never mutate it; rewrites work on copies.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Normalized address string, used as the backend identity.
    pub fn address(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }
}

impl PartialEq for Backend {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Backend {}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address())
    }
}
