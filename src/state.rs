use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::customer::Customer;
use crate::models::event::OrderEvent;
use crate::models::order::FuelOrder;
use crate::models::pump::FuelPump;
use crate::models::worker::DeliveryWorker;
use crate::observability::metrics::Metrics;

/// Role-scoped caller identity, resolved from a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Customer(Uuid),
    Pump(Uuid),
    Worker { id: Uuid, pump_id: Uuid },
}

pub struct AppState {
    pub customers: DashMap<Uuid, Customer>,
    pub pumps: DashMap<Uuid, FuelPump>,
    pub workers: DashMap<Uuid, DeliveryWorker>,
    pub orders: DashMap<Uuid, FuelOrder>,
    pub tokens: DashMap<String, Identity>,
    pub order_events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (order_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            customers: DashMap::new(),
            pumps: DashMap::new(),
            workers: DashMap::new(),
            orders: DashMap::new(),
            tokens: DashMap::new(),
            order_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Issues an opaque bearer token for the given identity.
    pub fn issue_token(&self, identity: Identity) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), identity);
        token
    }
}
