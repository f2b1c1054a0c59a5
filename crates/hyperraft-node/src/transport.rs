use crate::wire::{read_frame, write_frame, WireRequest, WireResponse};
use async_trait::async_trait;
use hyperraft_consensus::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse, Transport, TransportError, TransportResult,
};
use hyperraft_types::NodeId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Dials peers fresh for every call: one TCP connection per RPC, closed
/// after the response is read. Simple and sufficient at HyperRAFT++'s RPC
/// rate (heartbeats every `heartbeatInterval`, elections rarer still);
/// a connection-pooling transport would only pay for itself at far higher
/// throughput.
pub struct TcpTransport {
    peer_addresses: HashMap<NodeId, SocketAddr>,
}

impl TcpTransport {
    pub fn new(peer_addresses: HashMap<NodeId, SocketAddr>) -> Self {
        TcpTransport { peer_addresses }
    }

    fn address_of(&self, peer: &NodeId) -> TransportResult<SocketAddr> {
        self.peer_addresses
            .get(peer)
            .copied()
            .ok_or_else(|| TransportError::Unreachable(peer.clone(), "unknown peer".to_string()))
    }

    async fn call(
        &self,
        peer: &NodeId,
        request: WireRequest,
        call_timeout: Duration,
    ) -> TransportResult<WireResponse> {
        let addr = self.address_of(peer)?;
        tokio::time::timeout(call_timeout, self.call_inner(peer, addr, request))
            .await
            .map_err(|_| TransportError::Timeout(peer.clone()))?
    }

    async fn call_inner(
        &self,
        peer: &NodeId,
        addr: SocketAddr,
        request: WireRequest,
    ) -> TransportResult<WireResponse> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Unreachable(peer.clone(), e.to_string()))?;
        write_frame(&mut stream, &request)
            .await
            .map_err(|e| TransportError::Unreachable(peer.clone(), e.to_string()))?;
        read_frame(&mut stream)
            .await
            .map_err(|e| TransportError::Unreachable(peer.clone(), e.to_string()))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn request_vote(
        &self,
        peer: &NodeId,
        request: RequestVoteRequest,
        timeout: Duration,
    ) -> TransportResult<RequestVoteResponse> {
        match self
            .call(peer, WireRequest::RequestVote(request), timeout)
            .await?
        {
            WireResponse::RequestVote(resp) => Ok(resp),
            _ => Err(TransportError::Unreachable(
                peer.clone(),
                "peer returned a mismatched response variant".to_string(),
            )),
        }
    }

    async fn append_entries(
        &self,
        peer: &NodeId,
        request: AppendEntriesRequest,
        timeout: Duration,
    ) -> TransportResult<AppendEntriesResponse> {
        match self
            .call(peer, WireRequest::AppendEntries(request), timeout)
            .await?
        {
            WireResponse::AppendEntries(resp) => Ok(resp),
            _ => Err(TransportError::Unreachable(
                peer.clone(),
                "peer returned a mismatched response variant".to_string(),
            )),
        }
    }

    async fn install_snapshot(
        &self,
        peer: &NodeId,
        request: InstallSnapshotRequest,
        timeout: Duration,
    ) -> TransportResult<InstallSnapshotResponse> {
        match self
            .call(peer, WireRequest::InstallSnapshot(request), timeout)
            .await?
        {
            WireResponse::InstallSnapshot(resp) => Ok(resp),
            _ => Err(TransportError::Unreachable(
                peer.clone(),
                "peer returned a mismatched response variant".to_string(),
            )),
        }
    }
}
