use crate::StorageResult;
use async_trait::async_trait;
use hyperraft_types::Delivery;

pub enum ClaimOutcome {
    Claimed(Delivery),
    Empty,
}

/// Outcome a worker reports back via `ack`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    Delivered,
    DeadLettered,
}

/// Durable, partitioned, ordered-per-partition queue of `Delivery` records.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Idempotent keyed on `delivery_id`; persists before returning.
    async fn enqueue(&self, delivery: Delivery) -> StorageResult<()>;

    /// Claims the oldest claimable record in `partition`. Claimed records
    /// are invisible to other workers until `lease_expires_millis` passes or
    /// the worker acks. `now_millis` is the caller's current time, passed in
    /// explicitly rather than read from an ambient clock.
    async fn claim(
        &self,
        partition: u32,
        lease_expires_millis: u64,
        now_millis: u64,
    ) -> StorageResult<ClaimOutcome>;

    /// Transitions to `Delivered` or `DeadLettered`; removes from future claims.
    async fn ack(
        &self,
        delivery_id: &str,
        outcome: AckOutcome,
        last_error: Option<String>,
        response_latency_millis: Option<u64>,
    ) -> StorageResult<()>;

    /// Returns the record to its partition with a new `scheduled_at` and
    /// `attempt` incremented by one.
    async fn requeue(
        &self,
        delivery_id: &str,
        new_scheduled_at_millis: u64,
        last_error: Option<String>,
    ) -> StorageResult<()>;

    async fn depth(&self, partition: u32) -> StorageResult<usize>;

    /// Operator-facing read of the dead-letter partition; no automatic drain.
    async fn list_dead_lettered(&self, partition: u32) -> StorageResult<Vec<Delivery>>;
}
