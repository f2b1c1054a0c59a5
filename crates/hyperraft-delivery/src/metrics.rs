use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, IntCounter, IntGauge, Registry,
};

pub struct DeliveryMetrics {
    pub enqueued: IntCounter,
    pub dispatched: IntCounter,
    pub delivered: IntCounter,
    pub retried: IntCounter,
    pub dead_lettered: IntCounter,
    pub in_flight: IntGauge,
    pub dispatch_latency_seconds: Histogram,
}

impl DeliveryMetrics {
    pub fn new(registry: &Registry) -> Self {
        DeliveryMetrics {
            enqueued: register_int_counter_with_registry!(
                "hyperraft_delivery_enqueued_total",
                "Deliveries enqueued",
                registry
            )
            .unwrap(),
            dispatched: register_int_counter_with_registry!(
                "hyperraft_delivery_dispatched_total",
                "HTTP dispatch attempts made",
                registry
            )
            .unwrap(),
            delivered: register_int_counter_with_registry!(
                "hyperraft_delivery_delivered_total",
                "Deliveries acked as Delivered",
                registry
            )
            .unwrap(),
            retried: register_int_counter_with_registry!(
                "hyperraft_delivery_retried_total",
                "Deliveries requeued for another attempt",
                registry
            )
            .unwrap(),
            dead_lettered: register_int_counter_with_registry!(
                "hyperraft_delivery_dead_lettered_total",
                "Deliveries moved to the dead-letter partition",
                registry
            )
            .unwrap(),
            in_flight: register_int_gauge_with_registry!(
                "hyperraft_delivery_in_flight",
                "Deliveries currently claimed and awaiting an HTTP response",
                registry
            )
            .unwrap(),
            dispatch_latency_seconds: register_histogram_with_registry!(
                "hyperraft_delivery_dispatch_latency_seconds",
                "HTTP round-trip latency for a dispatch attempt",
                vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0],
                registry
            )
            .unwrap(),
        }
    }
}
