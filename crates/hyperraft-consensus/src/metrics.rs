use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, IntCounter, IntGauge, Registry,
};

/// Replication-loop metrics, registered against an injected `Registry`
/// rather than the process-global default one, so a node embedding several
/// consensus groups (or a test harness spinning up many nodes) does not
/// collide on metric names.
pub struct ConsensusMetrics {
    pub current_term: IntGauge,
    pub commit_index: IntGauge,
    pub elections_started: IntCounter,
    pub elections_won: IntCounter,
    pub append_entries_sent: IntCounter,
    pub append_entries_rejected: IntCounter,
    pub replication_latency_seconds: Histogram,
}

impl ConsensusMetrics {
    pub fn new(registry: &Registry) -> Self {
        ConsensusMetrics {
            current_term: register_int_gauge_with_registry!(
                "hyperraft_consensus_current_term",
                "Current election term observed by this node",
                registry
            )
            .unwrap(),
            commit_index: register_int_gauge_with_registry!(
                "hyperraft_consensus_commit_index",
                "Highest log index known committed",
                registry
            )
            .unwrap(),
            elections_started: register_int_counter_with_registry!(
                "hyperraft_consensus_elections_started_total",
                "Number of elections this node has started as a candidate",
                registry
            )
            .unwrap(),
            elections_won: register_int_counter_with_registry!(
                "hyperraft_consensus_elections_won_total",
                "Number of elections this node has won",
                registry
            )
            .unwrap(),
            append_entries_sent: register_int_counter_with_registry!(
                "hyperraft_consensus_append_entries_sent_total",
                "AppendEntries RPCs sent as leader",
                registry
            )
            .unwrap(),
            append_entries_rejected: register_int_counter_with_registry!(
                "hyperraft_consensus_append_entries_rejected_total",
                "AppendEntries RPCs rejected by a follower",
                registry
            )
            .unwrap(),
            replication_latency_seconds: register_histogram_with_registry!(
                "hyperraft_consensus_replication_latency_seconds",
                "Time from Propose to commit",
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
                registry
            )
            .unwrap(),
        }
    }
}
