use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::{ApiContext, ApiResponse};
use crate::error::AppError;
use crate::models::customer::Customer;
use crate::state::Identity;

pub fn router() -> Router<ApiContext> {
    Router::new().route("/customers", post(register_customer))
}

#[derive(Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct RegisteredCustomer {
    pub customer: Customer,
    pub token: String,
}

async fn register_customer(
    State(ctx): State<ApiContext>,
    Json(payload): Json<RegisterCustomerRequest>,
) -> Result<Json<ApiResponse<RegisteredCustomer>>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let customer = Customer {
        id: Uuid::new_v4(),
        name: payload.name,
        created_at: Utc::now(),
    };

    let state = &ctx.svc.state;
    let token = state.issue_token(Identity::Customer(customer.id));
    state.customers.insert(customer.id, customer.clone());

    Ok(ApiResponse::ok(RegisteredCustomer { customer, token }))
}
