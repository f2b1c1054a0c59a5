use prometheus::{register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge, Registry};

pub struct ProjectorMetrics {
    pub last_applied_index: IntGauge,
    pub approvals_finalized: IntCounter,
    pub approvals_created: IntCounter,
    pub votes_applied: IntCounter,
    pub pending_votes_expired: IntCounter,
}

impl ProjectorMetrics {
    pub fn new(registry: &Registry) -> Self {
        ProjectorMetrics {
            last_applied_index: register_int_gauge_with_registry!(
                "hyperraft_projector_last_applied_index",
                "Highest committed log index folded into the approval view",
                registry
            )
            .unwrap(),
            approvals_finalized: register_int_counter_with_registry!(
                "hyperraft_projector_approvals_finalized_total",
                "Approvals that left the Pending state",
                registry
            )
            .unwrap(),
            approvals_created: register_int_counter_with_registry!(
                "hyperraft_projector_approvals_created_total",
                "ApprovalCreate entries applied",
                registry
            )
            .unwrap(),
            votes_applied: register_int_counter_with_registry!(
                "hyperraft_projector_votes_applied_total",
                "Vote entries applied, including duplicates and post-finality votes",
                registry
            )
            .unwrap(),
            pending_votes_expired: register_int_counter_with_registry!(
                "hyperraft_projector_pending_votes_expired_total",
                "Buffered votes dropped because no ApprovalCreate arrived within the retention window",
                registry
            )
            .unwrap(),
        }
    }
}
