use crate::StorageResult;
use async_trait::async_trait;
use hyperraft_types::{LogEntry, LogIndex, Term};

/// Append-only replicated log storage.
///
/// Implementations must uphold log matching: once `append` has returned
/// `Ok`, the entry at that index never changes except via
/// `truncate_suffix_from`.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Appends entries starting immediately after the current last index.
    /// Fails if `entries` is non-contiguous with what is already stored.
    async fn append(&self, entries: Vec<LogEntry>) -> StorageResult<()>;

    /// Drops every entry at `index` and beyond, used when a follower's log
    /// diverges from the leader's.
    async fn truncate_suffix_from(&self, index: LogIndex) -> StorageResult<()>;

    async fn read(&self, index: LogIndex) -> StorageResult<Option<LogEntry>>;

    /// Inclusive range `[lo, hi]`.
    async fn read_range(&self, lo: LogIndex, hi: LogIndex) -> StorageResult<Vec<LogEntry>>;

    /// `(0, Term(0))` for an empty log.
    async fn last_index_term(&self) -> StorageResult<(LogIndex, Term)>;

    /// Durability fence: blocks until every entry appended so far is
    /// fsync'd, used before acknowledging a commit externally.
    async fn sync(&self) -> StorageResult<()>;
}
