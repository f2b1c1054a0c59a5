//! Abstract persistence layer for the replicated log, the projected approval
//! view, and the webhook delivery queue.
//!
//! Consumers depend on these traits only; an implementation may back them
//! with any ordered KV or relational store. This crate ships an
//! in-memory reference implementation (`memory`, always available, used by
//! tests and single-process demos) and an optional `rocksdb`-backed one
//! (`rocks`, behind the `rocks` feature) for a durable single-node deployment.

pub mod delivery_store;
pub mod log_store;
pub mod memory;
pub mod vote_store;

#[cfg(feature = "rocks")]
pub mod rocks;

pub use delivery_store::{ClaimOutcome, DeliveryStore};
pub use log_store::LogStore;
pub use vote_store::ApprovalView;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("requested index {0:?} has been compacted away")]
    Compacted(hyperraft_types::LogIndex),
    #[error("requested index {0:?} has not been appended yet")]
    NotYetAppended(hyperraft_types::LogIndex),
    #[error("underlying store I/O error: {0}")]
    Io(String),
    #[error("underlying store is corrupt: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// `hash(webhookID) mod P`, used to assign deliveries to queue partitions.
pub fn partition_of(webhook_id: &str, num_partitions: u32) -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    webhook_id.hash(&mut hasher);
    (hasher.finish() % num_partitions as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_of_is_stable_for_the_same_webhook() {
        assert_eq!(partition_of("wh-1", 8), partition_of("wh-1", 8));
    }

    #[test]
    fn partition_of_is_within_range() {
        for i in 0..50 {
            let id = format!("wh-{i}");
            assert!(partition_of(&id, 16) < 16);
        }
    }
}
