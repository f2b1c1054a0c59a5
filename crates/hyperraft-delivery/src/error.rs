use hyperraft_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("underlying storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("no webhook configured with id {0}")]
    UnknownWebhook(String),
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
