use async_trait::async_trait;
use hyperraft_types::{ApprovalStatus, LogIndex};
use serde::{Deserialize, Serialize};

/// Raised exactly once per approval, the first time its status leaves
/// `Pending`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFinalized {
    pub approval_id: String,
    pub status: ApprovalStatus,
    pub finalized_index: LogIndex,
}

/// Sink the projector pushes finality events into. Implemented by the
/// finality bus; kept as a trait here (rather than a dependency the other
/// way around) because the projector must not know its downstream
/// subscribers, only that something durable will observe this event.
///
/// `emit` blocking is how backpressure propagates to the projector: a slow
/// or stalled bus stalls `Apply`, never drops an event.
#[async_trait]
pub trait FinalityEmitter: Send + Sync {
    async fn emit(&self, event: ApprovalFinalized);
}

/// No-op emitter for tests and standalone projector benchmarking.
pub struct NullEmitter;

#[async_trait]
impl FinalityEmitter for NullEmitter {
    async fn emit(&self, _event: ApprovalFinalized) {}
}
