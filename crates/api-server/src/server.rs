//! API server: REST routes plus the Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::{delete, get, post};
use axum::Router;
use matchmaker_core::config::AppConfig;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

/// All REST routes with the standard middleware stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/recommendations/:user_id",
            get(rest::get_recommendations).delete(rest::clear_recommendations),
        )
        .route("/v1/swipes", post(rest::record_swipe))
        .route("/v1/swipes/:user_id", delete(rest::reset_swipes))
        .route("/v1/profiles/:user_id/embedding", post(rest::refresh_embedding))
        .route("/v1/profiles/:user_id/location", post(rest::submit_location))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
