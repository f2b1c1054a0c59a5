use hyperraft_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectorError {
    #[error("entries must be applied in order: expected index {expected:?}, got {got:?}")]
    OutOfOrder {
        expected: hyperraft_types::LogIndex,
        got: hyperraft_types::LogIndex,
    },
    #[error("underlying storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("malformed ApprovalCreate/Vote payload: {0}")]
    MalformedPayload(String),
}

pub type ProjectorResult<T> = Result<T, ProjectorError>;
