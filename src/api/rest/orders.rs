use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth;
use crate::api::rest::{ApiContext, ApiResponse};
use crate::error::AppError;
use crate::geo::{haversine_km, within_radius};
use crate::lifecycle::service::CreateOrderInput;
use crate::models::order::{DeliveryAddress, FuelOrder, FuelType, OrderStatus};
use crate::models::pump::{FuelPump, GeoPoint};
use crate::state::Identity;

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/fuel-orders", post(create_order))
        .route("/fuel-orders/user", get(customer_orders))
        .route("/fuel-orders/fuel-pump/orders", get(pump_orders))
        .route("/fuel-orders/delivery-boy/orders", get(worker_orders))
        .route("/fuel-orders/calculate-fare", post(calculate_fare))
        .route("/fuel-orders/nearby-pumps", get(nearby_pumps))
        .route("/fuel-orders/:order_id", get(get_order))
        .route("/fuel-orders/:order_id/assign-delivery", put(assign_delivery))
        .route("/fuel-orders/:order_id/status", put(update_status))
        .route("/fuel-orders/:order_id/cancel", post(cancel_order))
        .route("/fuel-orders/:order_id/mark-delivered", put(mark_delivered))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub pump_id: Uuid,
    pub fuel_type: FuelType,
    pub quantity: f64,
    pub delivery_address: DeliveryAddress,
    pub quoted_total: Option<f64>,
}

async fn create_order(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<FuelOrder>>, AppError> {
    let customer_id = auth::require_customer(&ctx.svc.state, &headers)?;

    let order = ctx.svc.create_order(
        customer_id,
        CreateOrderInput {
            pump_id: payload.pump_id,
            fuel_type: payload.fuel_type,
            quantity: payload.quantity,
            delivery_address: payload.delivery_address,
            quoted_total: payload.quoted_total,
        },
    )?;

    Ok(ApiResponse::ok(order))
}

async fn get_order(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<FuelOrder>>, AppError> {
    auth::authenticate(&ctx.svc.state, &headers)?;
    Ok(ApiResponse::ok(ctx.svc.order(order_id)?))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    /// Worker listings default to active orders; `all=true` includes history.
    pub all: Option<bool>,
}

async fn customer_orders(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<FuelOrder>>>, AppError> {
    let customer_id = auth::require_customer(&ctx.svc.state, &headers)?;
    Ok(ApiResponse::ok(
        ctx.svc.orders_for_customer(customer_id, query.status),
    ))
}

async fn pump_orders(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<FuelOrder>>>, AppError> {
    let pump_id = auth::require_pump(&ctx.svc.state, &headers)?;
    Ok(ApiResponse::ok(ctx.svc.orders_for_pump(pump_id, query.status)))
}

async fn worker_orders(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<FuelOrder>>>, AppError> {
    let (worker_id, _pump_id) = auth::require_worker(&ctx.svc.state, &headers)?;
    let active_only = !query.all.unwrap_or(false);
    Ok(ApiResponse::ok(ctx.svc.orders_for_worker(
        worker_id,
        query.status,
        active_only,
    )))
}

#[derive(Deserialize)]
pub struct AssignDeliveryRequest {
    pub worker_id: Uuid,
}

async fn assign_delivery(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<AssignDeliveryRequest>,
) -> Result<Json<ApiResponse<FuelOrder>>, AppError> {
    let pump_id = auth::require_pump(&ctx.svc.state, &headers)?;

    let order = ctx.svc.order(order_id)?;
    if order.pump_id != pump_id {
        return Err(AppError::Unauthorized(
            "order belongs to a different pump".to_string(),
        ));
    }

    let worker_pump = ctx
        .svc
        .state
        .workers
        .get(&payload.worker_id)
        .map(|entry| entry.pump_id)
        .ok_or_else(|| AppError::NotFound(format!("worker {} not found", payload.worker_id)))?;
    if worker_pump != pump_id {
        return Err(AppError::Unauthorized(
            "worker belongs to a different pump".to_string(),
        ));
    }

    Ok(ApiResponse::ok(
        ctx.svc.assign_worker(order_id, payload.worker_id)?,
    ))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

async fn update_status(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<FuelOrder>>, AppError> {
    let identity = auth::authenticate(&ctx.svc.state, &headers)?;
    let order = ctx.svc.order(order_id)?;

    let allowed = match identity {
        Identity::Pump(id) => order.pump_id == id,
        Identity::Worker { id, .. } => order.worker_id == Some(id),
        Identity::Customer(_) => false,
    };
    if !allowed {
        return Err(AppError::Unauthorized(
            "only the fulfilling pump or assigned worker may update status".to_string(),
        ));
    }

    Ok(ApiResponse::ok(
        ctx.svc.update_status(order_id, payload.status)?,
    ))
}

async fn cancel_order(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<FuelOrder>>, AppError> {
    let identity = auth::authenticate(&ctx.svc.state, &headers)?;
    let order = ctx.svc.order(order_id)?;

    let allowed = match identity {
        Identity::Customer(id) => order.customer_id == id,
        Identity::Pump(id) => order.pump_id == id,
        Identity::Worker { .. } => false,
    };
    if !allowed {
        return Err(AppError::Unauthorized(
            "only the ordering customer or fulfilling pump may cancel".to_string(),
        ));
    }

    Ok(ApiResponse::ok(ctx.svc.cancel_order(order_id)?))
}

async fn mark_delivered(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<FuelOrder>>, AppError> {
    let (worker_id, _pump_id) = auth::require_worker(&ctx.svc.state, &headers)?;

    let order = ctx.svc.order(order_id)?;
    if order.worker_id != Some(worker_id) {
        return Err(AppError::Unauthorized(
            "order is assigned to a different worker".to_string(),
        ));
    }

    Ok(ApiResponse::ok(ctx.svc.mark_delivered(order_id)?))
}

#[derive(Deserialize)]
pub struct CalculateFareRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Serialize)]
pub struct FareQuote {
    pub delivery_fee: f64,
    pub distance_km: f64,
}

async fn calculate_fare(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(payload): Json<CalculateFareRequest>,
) -> Result<Json<ApiResponse<FareQuote>>, AppError> {
    auth::authenticate(&ctx.svc.state, &headers)?;

    let delivery_fee = ctx.svc.quote_fare(&payload.origin, &payload.destination)?;
    let distance_km = haversine_km(&payload.origin, &payload.destination);

    Ok(ApiResponse::ok(FareQuote {
        delivery_fee,
        distance_km,
    }))
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
}

#[derive(Serialize)]
pub struct NearbyPump {
    #[serde(flatten)]
    pub pump: FuelPump,
    pub distance_km: f64,
}

async fn nearby_pumps(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<ApiResponse<Vec<NearbyPump>>>, AppError> {
    auth::authenticate(&ctx.svc.state, &headers)?;

    let center = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    if !center.lat.is_finite() || !center.lng.is_finite() {
        return Err(AppError::Validation(
            "coordinates must be finite numbers".to_string(),
        ));
    }
    let radius_km = query.radius_km.unwrap_or(ctx.nearby_radius_km);

    let mut pumps: Vec<NearbyPump> = ctx
        .svc
        .state
        .pumps
        .iter()
        .filter(|entry| within_radius(&center, &entry.location, radius_km))
        .map(|entry| NearbyPump {
            distance_km: haversine_km(&center, &entry.location),
            pump: entry.value().clone(),
        })
        .collect();

    pumps.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(ApiResponse::ok(pumps))
}
