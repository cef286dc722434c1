//! Usage proxy configuration structures to map the usage-proxy.toml configuration.

#![deny(missing_docs)]

mod loader;
mod token_usage;

use std::{borrow::Cow, net::SocketAddr, path::Path};

use serde::Deserialize;
pub use token_usage::{TokenUsageConfig, is_request_uri, parse_request_uri};
use url::Url;

/// Main configuration structure for the usage proxy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Where requests are forwarded to.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Token usage instrumentation settings.
    #[serde(default)]
    pub token_usage: TokenUsageConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates that the configuration has an upstream to forward to and a usable health path.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate_has_upstream(self)?;
        loader::validate_health_path(self)
    }
}

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
}

/// The upstream model server.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL every request is forwarded to, keeping the original path and query.
    pub url: Option<Url>,
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            path: Cow::Borrowed("/health"),
        }
    }
}
