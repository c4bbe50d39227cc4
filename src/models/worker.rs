use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Busy,
}

/// Availability is owned by the lifecycle service; no handler mutates it
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryWorker {
    pub id: Uuid,
    pub pump_id: Uuid,
    pub name: String,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
