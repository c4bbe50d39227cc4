mod api;
mod config;
mod error;
mod geo;
mod lifecycle;
mod models;
mod observability;
mod pricing;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::rest::ApiContext;
use crate::lifecycle::LifecycleService;
use crate::pricing::{DistanceFareEstimator, PostedPriceLookup};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let app_state = Arc::new(state::AppState::new(config.event_buffer_size));

    let fares = Arc::new(DistanceFareEstimator::new(
        config.base_fare,
        config.fare_per_km,
    ));
    let svc = Arc::new(LifecycleService::new(
        app_state.clone(),
        fares,
        Arc::new(PostedPriceLookup),
    ));

    let app = api::rest::router(ApiContext {
        svc,
        nearby_radius_km: config.nearby_radius_km,
    });

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
