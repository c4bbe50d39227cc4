pub mod customers;
pub mod orders;
pub mod pumps;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::lifecycle::LifecycleService;

/// Everything the REST boundary needs: the core service plus the few
/// config-derived defaults the handlers use directly.
#[derive(Clone)]
pub struct ApiContext {
    pub svc: Arc<LifecycleService>,
    pub nearby_radius_km: f64,
}

/// Response envelope shared by every endpoint: `{success, data?, message?}`.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

pub fn router(ctx: ApiContext) -> Router {
    Router::new()
        .merge(customers::router())
        .merge(orders::router())
        .merge(pumps::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
        .fallback_service(ServeDir::new("static"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    customers: usize,
    pumps: usize,
    workers: usize,
    orders: usize,
}

async fn health(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let state = &ctx.svc.state;
    Json(HealthResponse {
        status: "ok",
        customers: state.customers.len(),
        pumps: state.pumps.len(),
        workers: state.workers.len(),
        orders: state.orders.len(),
    })
}

async fn metrics(State(ctx): State<ApiContext>) -> impl IntoResponse {
    match ctx.svc.state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
