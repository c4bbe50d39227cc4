use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub assignments_total: IntCounterVec,
    pub order_transitions_total: IntCounterVec,
    pub workers_busy: IntGauge,
    pub order_create_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total fuel orders created")
                .expect("valid orders_created_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Delivery assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order status transitions by edge",
            ),
            &["from", "to"],
        )
        .expect("valid order_transitions_total metric");

        let workers_busy = IntGauge::new("workers_busy", "Delivery workers currently busy")
            .expect("valid workers_busy metric");

        let order_create_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "order_create_seconds",
                "Latency of order creation in seconds",
            ),
            &["outcome"],
        )
        .expect("valid order_create_seconds metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(workers_busy.clone()))
            .expect("register workers_busy");
        registry
            .register(Box::new(order_create_seconds.clone()))
            .expect("register order_create_seconds");

        Self {
            registry,
            orders_created_total,
            assignments_total,
            order_transitions_total,
            workers_busy,
            order_create_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
