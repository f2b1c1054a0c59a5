use hyperraft_types::{LogEntry, LogIndex, NodeId, Term};
use serde::{Deserialize, Serialize};

/// Candidate asking a peer for its vote.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteRequest {
    pub candidate_term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub voter_term: Term,
    pub vote_granted: bool,
}

/// Leader replicating entries, or an empty heartbeat when `entries` is empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub leader_term: Term,
    pub leader_id: NodeId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit: LogIndex,
}

/// A follower's append-entries response additionally carries a signature
/// over `(leader_term, match_index)` so the leader can assemble a
/// Byzantine-resistant quorum certificate once `match_index` is committed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub follower_term: Term,
    pub success: bool,
    pub match_index: LogIndex,
    pub signed_ack: Option<SignedAck>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedAck {
    pub voter: NodeId,
    pub term: Term,
    pub match_index: LogIndex,
    /// Hash of the entry the voter actually appended at `match_index`. Two
    /// conflicting payloads from a Byzantine leader at the same
    /// `(match_index, term)` hash differently, so their acks never merge
    /// into one quorum.
    pub content_hash: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallSnapshotRequest {
    pub leader_term: Term,
    pub leader_id: NodeId,
    pub last_included_index: LogIndex,
    pub last_included_term: Term,
    pub snapshot: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallSnapshotResponse {
    pub follower_term: Term,
}

/// Everything a peer can send us, multiplexed onto one inbound channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConsensusMessage {
    RequestVote(RequestVoteRequest),
    RequestVoteReply(NodeId, RequestVoteResponse),
    AppendEntries(AppendEntriesRequest),
    AppendEntriesReply(NodeId, AppendEntriesResponse),
    InstallSnapshot(InstallSnapshotRequest),
    InstallSnapshotReply(NodeId, InstallSnapshotResponse),
}
