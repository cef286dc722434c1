//! Usage proxy server library.
//!
//! Provides a reusable server function to serve the usage proxy either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod forward;
mod health;
mod instrument;

use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use axum::{Router, routing::get};
use config::Config;
use forward::Upstream;
use instrument::TokenUsageLayer;
use tokio::net::TcpListener;
use token_usage::TokenUsageFilter;

/// Configuration for serving the usage proxy.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized usage proxy TOML configuration.
    pub config: Config,
}

/// Builds the application router: health endpoint, instrumentation and upstream forwarding.
pub fn router(config: &Config) -> anyhow::Result<Router> {
    config.validate()?;

    let base_url = config
        .upstream
        .url
        .clone()
        .ok_or_else(|| anyhow!("No upstream URL configured"))?;

    let upstream = Arc::new(Upstream::new(base_url)?);
    let filter = TokenUsageFilter::new(&config.token_usage);

    log::debug!(
        "Instrumenting requests ending with: {}",
        filter.scope().suffixes().collect::<Vec<_>>().join(", ")
    );

    let mut app = Router::new();

    if config.server.health.enabled {
        app = app.route(&config.server.health.path, get(health::health));
    }

    let app = app
        .fallback(forward::handler)
        .with_state(upstream)
        .layer(TokenUsageLayer::new(filter));

    Ok(app)
}

/// Starts and runs the usage proxy with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let app = router(&config)?;

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if let Some(url) = &config.upstream.url {
        log::info!("Usage proxy listening on http://{listen_address}, forwarding to {url}");
    }

    if config.server.health.enabled {
        log::info!("Health check endpoint exposed at http://{listen_address}{}", config.server.health.path);
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}
