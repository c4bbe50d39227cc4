use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::transitions::can_transition;
use crate::models::event::OrderEvent;
use crate::models::order::{DeliveryAddress, FuelOrder, FuelType, OrderStatus};
use crate::models::pump::GeoPoint;
use crate::models::worker::Availability;
use crate::pricing::{FareEstimator, PriceLookup};
use crate::state::AppState;

pub struct CreateOrderInput {
    pub pump_id: Uuid,
    pub fuel_type: FuelType,
    pub quantity: f64,
    pub delivery_address: DeliveryAddress,
    /// Client-side quote, display confirmation only. The authoritative
    /// amount is always recomputed server-side.
    pub quoted_total: Option<f64>,
}

/// Sole authority for creating and transitioning orders, and for keeping
/// worker availability consistent with assignment.
pub struct LifecycleService {
    pub state: Arc<AppState>,
    fares: Arc<dyn FareEstimator>,
    prices: Arc<dyn PriceLookup>,
}

impl LifecycleService {
    pub fn new(
        state: Arc<AppState>,
        fares: Arc<dyn FareEstimator>,
        prices: Arc<dyn PriceLookup>,
    ) -> Self {
        Self {
            state,
            fares,
            prices,
        }
    }

    pub fn create_order(
        &self,
        customer_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<FuelOrder, AppError> {
        let start = Instant::now();
        let result = self.create_order_inner(customer_id, input);

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.state
            .metrics
            .order_create_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    fn create_order_inner(
        &self,
        customer_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<FuelOrder, AppError> {
        if !input.quantity.is_finite() || input.quantity <= 0.0 {
            return Err(AppError::Validation(
                "quantity must be a positive number".to_string(),
            ));
        }
        if input.delivery_address.text.trim().is_empty() {
            return Err(AppError::Validation(
                "delivery address cannot be empty".to_string(),
            ));
        }

        let pump = self
            .state
            .pumps
            .get(&input.pump_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("pump {} not found", input.pump_id)))?;

        let unit_price = self.prices.unit_price(&pump, input.fuel_type)?;
        let delivery_fee = self
            .fares
            .estimate(&pump.location, &input.delivery_address.coordinates)?;
        let total_amount = unit_price * input.quantity + delivery_fee;

        if let Some(quoted) = input.quoted_total {
            if (quoted - total_amount).abs() > 0.01 {
                warn!(
                    quoted,
                    total_amount, "client quote disagrees with computed total; using computed"
                );
            }
        }

        let now = Utc::now();
        let order = FuelOrder {
            id: Uuid::new_v4(),
            customer_id,
            pump_id: pump.id,
            worker_id: None,
            fuel_type: input.fuel_type,
            quantity: input.quantity,
            unit_price,
            delivery_fee,
            total_amount,
            delivery_address: input.delivery_address,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.state.orders.insert(order.id, order.clone());
        self.state.metrics.orders_created_total.inc();
        self.emit(&order);

        info!(
            order_id = %order.id,
            pump_id = %order.pump_id,
            total_amount = order.total_amount,
            "order created"
        );

        Ok(order)
    }

    /// Assigns a worker to a pending order. The availability flip is a
    /// compare-and-swap under the worker's map entry lock, and the order
    /// update re-validates under the order's entry lock with a worker
    /// rollback, so two callers can never double-book one worker or land
    /// two workers on one order.
    pub fn assign_worker(&self, order_id: Uuid, worker_id: Uuid) -> Result<FuelOrder, AppError> {
        match self.assign_worker_inner(order_id, worker_id) {
            Ok(order) => {
                self.state
                    .metrics
                    .assignments_total
                    .with_label_values(&["success"])
                    .inc();
                Ok(order)
            }
            Err(err) => {
                self.state
                    .metrics
                    .assignments_total
                    .with_label_values(&["error"])
                    .inc();
                Err(err)
            }
        }
    }

    fn assign_worker_inner(&self, order_id: Uuid, worker_id: Uuid) -> Result<FuelOrder, AppError> {
        {
            let order = self
                .state
                .orders
                .get(&order_id)
                .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
            if !can_transition(order.status, OrderStatus::Assigned) {
                return Err(AppError::Conflict(format!(
                    "cannot assign a delivery worker to an order in status {}",
                    order.status
                )));
            }
        }

        {
            let mut worker = self
                .state
                .workers
                .get_mut(&worker_id)
                .ok_or_else(|| AppError::NotFound(format!("worker {worker_id} not found")))?;
            if worker.availability != Availability::Available {
                return Err(AppError::Conflict("worker already assigned".to_string()));
            }
            worker.availability = Availability::Busy;
            worker.updated_at = Utc::now();
        }
        self.state.metrics.workers_busy.inc();

        let snapshot = {
            let Some(mut order) = self.state.orders.get_mut(&order_id) else {
                // orders are never removed; keep the worker consistent anyway
                self.release_worker(worker_id);
                return Err(AppError::NotFound(format!("order {order_id} not found")));
            };
            if order.worker_id.is_some() || !can_transition(order.status, OrderStatus::Assigned) {
                drop(order);
                self.release_worker(worker_id);
                return Err(AppError::Conflict(
                    "order was assigned concurrently".to_string(),
                ));
            }

            let from = order.status;
            order.status = OrderStatus::Assigned;
            order.worker_id = Some(worker_id);
            order.updated_at = Utc::now();
            self.record_transition(from, order.status);
            order.clone()
        };

        self.emit(&snapshot);
        info!(order_id = %order_id, worker_id = %worker_id, "delivery worker assigned");

        Ok(snapshot)
    }

    pub fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<FuelOrder, AppError> {
        if new_status == OrderStatus::Assigned {
            self.order(order_id)?;
            return Err(AppError::Conflict(
                "assignment must go through the assign-delivery operation".to_string(),
            ));
        }

        self.transition(order_id, new_status, |from| {
            format!("cannot move order from {from} to {new_status}")
        })
    }

    pub fn cancel_order(&self, order_id: Uuid) -> Result<FuelOrder, AppError> {
        self.transition(order_id, OrderStatus::Cancelled, |_from| {
            "cannot cancel order in current status".to_string()
        })
    }

    pub fn mark_delivered(&self, order_id: Uuid) -> Result<FuelOrder, AppError> {
        self.transition(order_id, OrderStatus::Delivered, |from| {
            format!("cannot mark an order in status {from} as delivered")
        })
    }

    fn transition(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        conflict_msg: impl Fn(OrderStatus) -> String,
    ) -> Result<FuelOrder, AppError> {
        let (snapshot, freed_worker) = {
            let mut order = self
                .state
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

            if !can_transition(order.status, to) {
                return Err(AppError::Conflict(conflict_msg(order.status)));
            }

            let from = order.status;
            order.status = to;
            order.updated_at = Utc::now();
            self.record_transition(from, to);

            // the order keeps its worker reference for history; only the
            // worker's availability is released
            let freed = if to.is_terminal() { order.worker_id } else { None };
            (order.clone(), freed)
        };

        if let Some(worker_id) = freed_worker {
            self.release_worker(worker_id);
        }

        self.emit(&snapshot);
        info!(order_id = %order_id, status = %snapshot.status, "order status updated");

        Ok(snapshot)
    }

    fn release_worker(&self, worker_id: Uuid) {
        if let Some(mut worker) = self.state.workers.get_mut(&worker_id) {
            if worker.availability == Availability::Busy {
                worker.availability = Availability::Available;
                worker.updated_at = Utc::now();
                self.state.metrics.workers_busy.dec();
            }
        }
    }

    fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
        self.state
            .metrics
            .order_transitions_total
            .with_label_values(&[&from.to_string(), &to.to_string()])
            .inc();
    }

    fn emit(&self, order: &FuelOrder) {
        let _ = self.state.order_events_tx.send(OrderEvent {
            order_id: order.id,
            status: order.status,
            at: order.updated_at,
        });
    }

    /// Fare preview for an origin/destination pair, using the same estimator
    /// that prices orders.
    pub fn quote_fare(&self, origin: &GeoPoint, destination: &GeoPoint) -> Result<f64, AppError> {
        self.fares.estimate(origin, destination)
    }

    pub fn order(&self, order_id: Uuid) -> Result<FuelOrder, AppError> {
        self.state
            .orders
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    pub fn orders_for_customer(
        &self,
        customer_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Vec<FuelOrder> {
        self.collect_orders(|order| order.customer_id == customer_id, status)
    }

    pub fn orders_for_pump(&self, pump_id: Uuid, status: Option<OrderStatus>) -> Vec<FuelOrder> {
        self.collect_orders(|order| order.pump_id == pump_id, status)
    }

    pub fn orders_for_worker(
        &self,
        worker_id: Uuid,
        status: Option<OrderStatus>,
        active_only: bool,
    ) -> Vec<FuelOrder> {
        self.collect_orders(
            |order| order.worker_id == Some(worker_id) && !(active_only && order.status.is_terminal()),
            status,
        )
    }

    pub fn orders_by_status(&self, status: OrderStatus) -> Vec<FuelOrder> {
        self.collect_orders(|_| true, Some(status))
    }

    /// Most-recent-first, as every listing surface presents orders.
    fn collect_orders(
        &self,
        filter: impl Fn(&FuelOrder) -> bool,
        status: Option<OrderStatus>,
    ) -> Vec<FuelOrder> {
        let mut orders: Vec<FuelOrder> = self
            .state
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                filter(order) && status.map_or(true, |s| order.status == s)
            })
            .map(|entry| entry.value().clone())
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{CreateOrderInput, LifecycleService};
    use crate::error::AppError;
    use crate::models::customer::Customer;
    use crate::models::order::{DeliveryAddress, FuelType, OrderStatus};
    use crate::models::pump::{FuelPump, GeoPoint};
    use crate::models::worker::{Availability, DeliveryWorker};
    use crate::pricing::{FareEstimator, PostedPriceLookup, PriceLookup};
    use crate::state::AppState;

    struct FixedFare(f64);

    impl FareEstimator for FixedFare {
        fn estimate(&self, _: &GeoPoint, _: &GeoPoint) -> Result<f64, AppError> {
            Ok(self.0)
        }
    }

    struct BrokenFare;

    impl FareEstimator for BrokenFare {
        fn estimate(&self, _: &GeoPoint, _: &GeoPoint) -> Result<f64, AppError> {
            Err(AppError::Upstream("route service unreachable".to_string()))
        }
    }

    struct Fixture {
        service: Arc<LifecycleService>,
        customer_id: Uuid,
        pump_id: Uuid,
        worker_id: Uuid,
    }

    fn fixture_with_fare(fares: Arc<dyn FareEstimator>) -> Fixture {
        let state = Arc::new(AppState::new(64));
        let now = Utc::now();

        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            created_at: now,
        };
        let pump = FuelPump {
            id: Uuid::new_v4(),
            name: "Harbor Fuels".to_string(),
            address: "1 Dock Street".to_string(),
            location: GeoPoint {
                lat: 53.5511,
                lng: 9.9937,
            },
            prices: HashMap::from([(FuelType::Regular, 3.5), (FuelType::Diesel, 4.1)]),
            created_at: now,
        };
        let worker = DeliveryWorker {
            id: Uuid::new_v4(),
            pump_id: pump.id,
            name: "Kai".to_string(),
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        };

        let fixture = Fixture {
            customer_id: customer.id,
            pump_id: pump.id,
            worker_id: worker.id,
            service: Arc::new(LifecycleService::new(
                state.clone(),
                fares,
                Arc::new(PostedPriceLookup),
            )),
        };

        state.customers.insert(customer.id, customer);
        state.pumps.insert(pump.id, pump);
        state.workers.insert(worker.id, worker);
        fixture
    }

    fn fixture() -> Fixture {
        fixture_with_fare(Arc::new(FixedFare(150.0)))
    }

    fn order_input(pump_id: Uuid) -> CreateOrderInput {
        CreateOrderInput {
            pump_id,
            fuel_type: FuelType::Regular,
            quantity: 10.0,
            delivery_address: DeliveryAddress {
                text: "12 Canal Road".to_string(),
                coordinates: GeoPoint {
                    lat: 53.56,
                    lng: 10.0,
                },
            },
            quoted_total: None,
        }
    }

    fn availability(fx: &Fixture) -> Availability {
        fx.service
            .state
            .workers
            .get(&fx.worker_id)
            .unwrap()
            .availability
    }

    #[test]
    fn created_order_snapshots_price_and_fee_into_the_total() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!((order.total_amount - (3.5 * 10.0 + 150.0)).abs() < 1e-9);
        assert!((order.total_amount - 185.0).abs() < 1e-9);
        assert_eq!(order.worker_id, None);
    }

    #[test]
    fn create_rejects_non_positive_quantity() {
        let fx = fixture();
        let mut input = order_input(fx.pump_id);
        input.quantity = 0.0;

        let result = fx.service.create_order(fx.customer_id, input);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn create_with_unknown_pump_is_not_found() {
        let fx = fixture();
        let result = fx
            .service
            .create_order(fx.customer_id, order_input(Uuid::new_v4()));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn estimator_failure_propagates_as_upstream() {
        let fx = fixture_with_fare(Arc::new(BrokenFare));
        let result = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id));
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[test]
    fn assignment_marks_the_worker_busy() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();

        let assigned = fx.service.assign_worker(order.id, fx.worker_id).unwrap();
        assert_eq!(assigned.status, OrderStatus::Assigned);
        assert_eq!(assigned.worker_id, Some(fx.worker_id));
        assert_eq!(availability(&fx), Availability::Busy);
    }

    #[test]
    fn busy_worker_cannot_be_assigned_twice() {
        let fx = fixture();
        let first = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        let second = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();

        fx.service.assign_worker(first.id, fx.worker_id).unwrap();
        let result = fx.service.assign_worker(second.id, fx.worker_id);
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn delivery_frees_the_worker() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service.assign_worker(order.id, fx.worker_id).unwrap();

        let delivered = fx.service.mark_delivered(order.id).unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.worker_id, Some(fx.worker_id));
        assert_eq!(availability(&fx), Availability::Available);
    }

    #[test]
    fn cancelling_an_assigned_order_frees_the_worker() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service.assign_worker(order.id, fx.worker_id).unwrap();

        let cancelled = fx.service.cancel_order(order.id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(availability(&fx), Availability::Available);
    }

    #[test]
    fn terminal_orders_cannot_be_cancelled() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service.assign_worker(order.id, fx.worker_id).unwrap();
        fx.service.mark_delivered(order.id).unwrap();

        let result = fx.service.cancel_order(order.id);
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let pending = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service.cancel_order(pending.id).unwrap();
        let again = fx.service.cancel_order(pending.id);
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();

        // pending orders have no worker to deliver them
        let result = fx.service.update_status(order.id, OrderStatus::Delivered);
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // direct status writes may not bypass the assignment operation
        let result = fx.service.update_status(order.id, OrderStatus::Assigned);
        assert!(matches!(result, Err(AppError::Conflict(_))));

        fx.service.assign_worker(order.id, fx.worker_id).unwrap();
        let in_transit = fx
            .service
            .update_status(order.id, OrderStatus::InTransit)
            .unwrap();
        assert_eq!(in_transit.status, OrderStatus::InTransit);
    }

    #[test]
    fn customer_listing_is_isolated_and_most_recent_first() {
        let fx = fixture();
        let other_customer = Uuid::new_v4();

        let first = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        let second = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service
            .create_order(other_customer, order_input(fx.pump_id))
            .unwrap();

        // pin creation times so the ordering assertion is deterministic
        fx.service.state.orders.get_mut(&first.id).unwrap().created_at =
            Utc::now() - Duration::minutes(5);

        let listed = fx.service.orders_for_customer(fx.customer_id, None);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert!(listed.iter().all(|o| o.customer_id == fx.customer_id));
    }

    #[test]
    fn status_filter_narrows_listings() {
        let fx = fixture();
        let order = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        fx.service.assign_worker(order.id, fx.worker_id).unwrap();

        let assigned = fx.service.orders_by_status(OrderStatus::Assigned);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, order.id);

        let pending = fx
            .service
            .orders_for_pump(fx.pump_id, Some(OrderStatus::Pending));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn concurrent_assignment_of_one_worker_admits_exactly_one_winner() {
        let fx = fixture();
        let first = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();
        let second = fx
            .service
            .create_order(fx.customer_id, order_input(fx.pump_id))
            .unwrap();

        let svc_a = fx.service.clone();
        let svc_b = fx.service.clone();
        let worker_id = fx.worker_id;

        let a = thread::spawn(move || svc_a.assign_worker(first.id, worker_id));
        let b = thread::spawn(move || svc_b.assign_worker(second.id, worker_id));

        let results = [a.join().unwrap(), b.join().unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert_eq!(availability(&fx), Availability::Busy);
    }
}
