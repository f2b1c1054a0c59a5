//! Replicated log core: leader election, log replication, and the
//! Byzantine-resistant signed-ack extension used to finalize a commit.
//!
//! `Core` is the only thing that touches consensus state; every other
//! crate talks to it through `ConsensusHandle` (client side: propose, read
//! status, subscribe to commits) or `RpcInbox` (server side: answer a
//! peer's RPC). Neither handle exposes a lock — every call is a channel
//! round trip into the single task that owns the state.

mod core;
mod error;
mod messages;
mod signer;
mod state;
mod transport;

pub mod metrics;

pub use crate::core::{
    ConsensusHandle, Core, CoreHandles, NodeStatus, ProposeCommand, RpcInbox,
};
pub use error::{ConsensusError, ConsensusResult};
pub use messages::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse, SignedAck,
};
pub use metrics::ConsensusMetrics;
pub use signer::{HmacSigner, Signer};
pub use state::{ClusterConfig, NodeRole};
pub use transport::{Transport, TransportError, TransportResult};
