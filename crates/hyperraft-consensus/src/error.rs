use hyperraft_storage::StorageError;
use hyperraft_types::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("this node ({0}) is not the leader")]
    NotLeader(NodeId),

    #[error("current leader is unknown")]
    LeaderUnknown,

    #[error("proposal rejected: node is shutting down")]
    ShuttingDown,

    #[error("underlying storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("signature verification failed for voter {0}")]
    BadSignature(NodeId),

    #[error("peer {0} is not a recognized member of this cluster")]
    UnknownPeer(NodeId),
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
