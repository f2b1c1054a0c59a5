use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Registry,
};

pub struct BusMetrics {
    pub subscribers: IntGauge,
    pub events_published: IntCounter,
    pub publish_blocked_total: IntCounter,
}

impl BusMetrics {
    pub fn new(registry: &Registry) -> Self {
        BusMetrics {
            subscribers: register_int_gauge_with_registry!(
                "hyperraft_bus_subscribers",
                "Current number of live finality-bus subscribers",
                registry
            )
            .unwrap(),
            events_published: register_int_counter_with_registry!(
                "hyperraft_bus_events_published_total",
                "ApprovalFinalized events published to all subscribers",
                registry
            )
            .unwrap(),
            publish_blocked_total: register_int_counter_with_registry!(
                "hyperraft_bus_publish_blocked_total",
                "Times publish had to wait on a full subscriber channel",
                registry
            )
            .unwrap(),
        }
    }
}
