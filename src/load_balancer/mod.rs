//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher needs a destination
//!     → LoadBalancer::next_backend()
//!     → algorithm (round_robin.rs) scans the current sequence under a read lock
//!     → Return a healthy backend.rs descriptor or NoHealthyBackends
//!
//! Admin API / config reload
//!     → update_backends() swaps the whole sequence under the write lock
//!     → health_check() flips one descriptor's flag under the write lock
//! ```
//!
//! # Design Decisions
//! - The balancer owns its sequence; no global state, handles are passed explicitly
//! - Algorithms form a closed set selected by [`Algorithm`]
//! - Health is supplied from outside; nothing here probes backends
//! - Sequence order is the rotation order

pub mod backend;
pub mod round_robin;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use backend::{Backend, BackendError};
pub use round_robin::RoundRobin;

/// Errors produced by load balancers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadBalancerError {
    /// Every registered backend is unhealthy, or none are registered.
    #[error("no healthy backends available")]
    NoHealthyBackends,
    /// The configured algorithm identifier is not supported.
    #[error("unsupported load balancing algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Contract shared by every load balancing algorithm.
///
/// Implementations must tolerate unbounded concurrent calls from request tasks.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick a currently healthy backend from the current sequence.
    fn next_backend(&self) -> Result<Arc<Backend>, LoadBalancerError>;

    /// Atomically replace the entire backend sequence.
    fn update_backends(&self, backends: Vec<Backend>);

    /// Set the health flag of the backend with the same address.
    ///
    /// Unknown addresses are ignored.
    fn health_check(&self, backend: &Backend, healthy: bool);

    /// A consistent snapshot of the current sequence, in rotation order.
    fn backends(&self) -> Vec<Arc<Backend>>;

    /// The algorithm this balancer implements.
    fn algorithm(&self) -> Algorithm;
}

/// Supported load balancing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
}

impl Algorithm {
    /// Configuration identifier of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
        }
    }

    /// Build a balancer running this algorithm over `backends`.
    pub fn build(self, backends: Vec<Backend>) -> Arc<dyn LoadBalancer> {
        match self {
            Algorithm::RoundRobin => Arc::new(RoundRobin::new(backends)),
        }
    }
}

impl FromStr for Algorithm {
    type Err = LoadBalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Algorithm::RoundRobin),
            other => Err(LoadBalancerError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a list of address strings into healthy backends.
///
/// Fails on the first invalid address; nothing is returned partially.
pub fn parse_backends<S: AsRef<str>>(addresses: &[S]) -> Result<Vec<Backend>, BackendError> {
    addresses
        .iter()
        .map(|address| Backend::parse(address.as_ref()))
        .collect()
}
