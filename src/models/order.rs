use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::pump::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FuelType {
    Regular,
    Premium,
    Diesel,
    Kerosene,
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FuelType::Regular => "regular",
            FuelType::Premium => "premium",
            FuelType::Diesel => "diesel",
            FuelType::Kerosene => "kerosene",
        };
        f.write_str(name)
    }
}

/// `Accepted` exists in the stored schema but no operation produces it;
/// the transition table rejects it until an acceptance step is defined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InTransit => "in-transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub coordinates: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pump_id: Uuid,
    pub worker_id: Option<Uuid>,
    pub fuel_type: FuelType,
    pub quantity: f64,
    pub unit_price: f64,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub delivery_address: DeliveryAddress,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn statuses_use_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&OrderStatus::InTransit).unwrap();
        assert_eq!(json, "\"in-transit\"");

        let parsed: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }

    #[test]
    fn only_delivered_and_cancelled_are_terminal() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
        assert!(!OrderStatus::Assigned.is_terminal());
        assert!(!OrderStatus::InTransit.is_terminal());
    }
}
