//! Load-balancing HTTP reverse proxy library.
//!
//! Inbound requests are forwarded to a backend chosen either statically or by
//! a round-robin balancer that skips backends marked unhealthy.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Backend, LoadBalancer, LoadBalancerError, RoundRobin};
pub use proxy::{DispatchError, Dispatcher};
