use crate::StorageResult;
use async_trait::async_trait;
use hyperraft_types::{Approval, LogIndex};

/// Key-value snapshot view over projected `Approval` state.
///
/// Writes are always a batch applied atomically together with an advance of
/// `last_applied_index`, so a reader never observes a partially-applied
/// committed entry.
#[async_trait]
pub trait ApprovalView: Send + Sync {
    async fn get(&self, approval_id: &str) -> StorageResult<Option<Approval>>;

    /// Atomically writes `approvals` and advances the watermark to
    /// `applied_through`. `applied_through` must be `>=` the current
    /// watermark.
    async fn apply_batch(
        &self,
        approvals: Vec<Approval>,
        applied_through: LogIndex,
    ) -> StorageResult<()>;

    async fn last_applied_index(&self) -> StorageResult<LogIndex>;
}
