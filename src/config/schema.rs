//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::loader::ConfigError;
use crate::load_balancer::{self, backend::parse_address, Algorithm, LoadBalancer};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Inbound server settings.
    pub server: ServerConfig,

    /// Upstream (static target and client) settings.
    pub proxy: UpstreamConfig,

    /// Load balancing settings.
    pub load_balancing: LoadBalancingConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Inbound server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub listen_addr: String,

    /// Deadline in seconds for a backend to start answering. 0 disables it.
    pub write_timeout: u64,

    /// Idle keep-alive in seconds for pooled upstream connections.
    pub idle_timeout: u64,
}

impl ServerConfig {
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout > 0).then(|| Duration::from_secs(self.write_timeout))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            write_timeout: 10,
            idle_timeout: 120,
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Static target, used only when load balancing is disabled.
    pub target_addr: String,

    /// Idle pooled connections kept per backend host.
    pub max_idle_conns: usize,

    /// Connection establishment timeout in seconds.
    pub dial_timeout: u64,
}

impl UpstreamConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_addr: String::new(),
            max_idle_conns: 100,
            dial_timeout: 10,
        }
    }
}

/// Load balancing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancingConfig {
    /// Enable load balancing across `backends`.
    pub enabled: bool,

    /// Algorithm identifier (`round_robin`).
    pub algorithm: String,

    /// Backend addresses, in rotation order.
    pub backends: Vec<String>,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: Algorithm::RoundRobin.as_str().to_string(),
            backends: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). Unknown values mean info.
    pub level: String,

    /// Output format (text, json). Unknown values mean text.
    pub format: String,
}

impl LoggingConfig {
    pub fn level_filter(&self) -> tracing::Level {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }

    pub fn format(&self) -> LogFormat {
        if self.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// API key for authentication (Bearer token). Required when enabled.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: String::new(),
        }
    }
}

impl ProxyConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProxyConfig = toml::from_str(content)?;
        crate::config::validation::validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// The static target, if one is configured.
    pub fn target_url(&self) -> Result<Option<Url>, ConfigError> {
        let raw = self.proxy.target_addr.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(parse_address(raw)?))
    }

    /// Build the configured load balancer. `None` when load balancing is
    /// disabled. Every backend starts healthy.
    pub fn create_load_balancer(&self) -> Result<Option<Arc<dyn LoadBalancer>>, ConfigError> {
        if !self.load_balancing.enabled {
            return Ok(None);
        }
        let algorithm: Algorithm = self.load_balancing.algorithm.parse()?;
        let backends = load_balancer::parse_backends(&self.load_balancing.backends)?;
        Ok(Some(algorithm.build(backends)))
    }
}
