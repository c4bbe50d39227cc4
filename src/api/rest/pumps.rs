use std::collections::HashMap;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth;
use crate::api::rest::{ApiContext, ApiResponse};
use crate::error::AppError;
use crate::models::order::FuelType;
use crate::models::pump::{FuelPump, GeoPoint};
use crate::models::worker::{Availability, DeliveryWorker};
use crate::state::Identity;

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/fuel-pumps", post(register_pump))
        .route(
            "/fuel-pumps/workers",
            post(register_worker).get(list_workers),
        )
}

#[derive(Deserialize)]
pub struct RegisterPumpRequest {
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub prices: HashMap<FuelType, f64>,
}

#[derive(Serialize)]
pub struct RegisteredPump {
    pub pump: FuelPump,
    pub token: String,
}

async fn register_pump(
    State(ctx): State<ApiContext>,
    Json(payload): Json<RegisterPumpRequest>,
) -> Result<Json<ApiResponse<RegisteredPump>>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if payload.prices.values().any(|price| *price <= 0.0) {
        return Err(AppError::Validation(
            "posted prices must be positive".to_string(),
        ));
    }

    let pump = FuelPump {
        id: Uuid::new_v4(),
        name: payload.name,
        address: payload.address,
        location: payload.location,
        prices: payload.prices,
        created_at: Utc::now(),
    };

    let state = &ctx.svc.state;
    let token = state.issue_token(Identity::Pump(pump.id));
    state.pumps.insert(pump.id, pump.clone());

    Ok(ApiResponse::ok(RegisteredPump { pump, token }))
}

#[derive(Deserialize)]
pub struct RegisterWorkerRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct RegisteredWorker {
    pub worker: DeliveryWorker,
    pub token: String,
}

async fn register_worker(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(payload): Json<RegisterWorkerRequest>,
) -> Result<Json<ApiResponse<RegisteredWorker>>, AppError> {
    let pump_id = auth::require_pump(&ctx.svc.state, &headers)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let now = Utc::now();
    let worker = DeliveryWorker {
        id: Uuid::new_v4(),
        pump_id,
        name: payload.name,
        availability: Availability::Available,
        created_at: now,
        updated_at: now,
    };

    let state = &ctx.svc.state;
    let token = state.issue_token(Identity::Worker {
        id: worker.id,
        pump_id,
    });
    state.workers.insert(worker.id, worker.clone());

    Ok(ApiResponse::ok(RegisteredWorker { worker, token }))
}

async fn list_workers(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<DeliveryWorker>>>, AppError> {
    let pump_id = auth::require_pump(&ctx.svc.state, &headers)?;

    let workers = ctx
        .svc
        .state
        .workers
        .iter()
        .filter(|entry| entry.pump_id == pump_id)
        .map(|entry| entry.value().clone())
        .collect();

    Ok(ApiResponse::ok(workers))
}
