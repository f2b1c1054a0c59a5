use hyperraft_types::{Vote, VoterId};
use serde::{Deserialize, Serialize};

/// Decoded form of a `LogEntry` whose `kind` is `ApprovalCreate`. Callers on
/// the leader side encode one of these as `LogEntry::payload` with
/// `serde_json`; the projector is the only reader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalCreatePayload {
    pub approval_id: String,
    pub subject: Vec<u8>,
    pub quorum_size: u32,
    pub fault_tolerance: u32,
}

/// Decoded form of a `LogEntry` whose `kind` is `Vote`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotePayload {
    pub approval_id: String,
    pub voter_id: VoterId,
    pub vote: Vote,
}
