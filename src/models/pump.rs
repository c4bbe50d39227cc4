use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::FuelType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelPump {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    /// Posted price per unit for each fuel type the pump carries.
    pub prices: HashMap<FuelType, f64>,
    pub created_at: DateTime<Utc>,
}
