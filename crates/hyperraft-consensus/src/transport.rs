use crate::messages::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse,
};
use async_trait::async_trait;
use hyperraft_types::NodeId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} unreachable: {1}")]
    Unreachable(NodeId, String),
    #[error("request to peer {0} timed out")]
    Timeout(NodeId),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Outbound RPC capability the core loop uses to talk to peers. Implemented
/// by `hyperraft-node` over the length-prefixed wire codec; an in-process
/// implementation is provided here for tests that run several nodes in one
/// process.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request_vote(
        &self,
        peer: &NodeId,
        request: RequestVoteRequest,
        timeout: Duration,
    ) -> TransportResult<RequestVoteResponse>;

    async fn append_entries(
        &self,
        peer: &NodeId,
        request: AppendEntriesRequest,
        timeout: Duration,
    ) -> TransportResult<AppendEntriesResponse>;

    async fn install_snapshot(
        &self,
        peer: &NodeId,
        request: InstallSnapshotRequest,
        timeout: Duration,
    ) -> TransportResult<InstallSnapshotResponse>;
}
