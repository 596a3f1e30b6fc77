//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses (listen, target, backends, admin)
//! - Reject unknown load balancing algorithms before anything is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - A config with neither target nor balancer is accepted; requests get 503

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::{backend::parse_address, Algorithm};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.server.listen_addr.parse::<SocketAddr>() {
        errors.push(ValidationError::new("server.listen_addr", e.to_string()));
    }

    let target = config.proxy.target_addr.trim();
    if !target.is_empty() {
        if let Err(e) = parse_address(target) {
            errors.push(ValidationError::new("proxy.target_addr", e.to_string()));
        }
    }

    let lb = &config.load_balancing;
    if lb.enabled {
        if let Err(e) = lb.algorithm.parse::<Algorithm>() {
            errors.push(ValidationError::new("load_balancing.algorithm", e.to_string()));
        }
        for (i, backend) in lb.backends.iter().enumerate() {
            if let Err(e) = parse_address(backend) {
                errors.push(ValidationError::new(format!("load_balancing.backends[{i}]"), e.to_string()));
            }
        }
    }

    let admin = &config.admin;
    if admin.enabled {
        if let Err(e) = admin.bind_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new("admin.bind_address", e.to_string()));
        }
        if admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must be set when the admin API is enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
