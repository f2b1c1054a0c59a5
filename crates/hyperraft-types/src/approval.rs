use crate::ids::VoterId;
use crate::log_entry::LogIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Approve,
    Reject,
    Abstain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_final(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// The state-machine object the vote aggregator maintains.
///
/// `votes` is keyed by `VoterId` and last-write-wins: a duplicate vote from
/// the same voter logically replaces the previous one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approval_id: String,
    pub subject: Vec<u8>,
    pub quorum_size: u32,
    pub fault_tolerance: u32,
    pub votes: BTreeMap<VoterId, Vote>,
    pub status: ApprovalStatus,
    pub first_seen_index: LogIndex,
    pub finalized_index: Option<LogIndex>,
}

impl Approval {
    pub fn new(
        approval_id: String,
        subject: Vec<u8>,
        quorum_size: u32,
        fault_tolerance: u32,
        first_seen_index: LogIndex,
    ) -> Self {
        Approval {
            approval_id,
            subject,
            quorum_size,
            fault_tolerance,
            votes: BTreeMap::new(),
            status: ApprovalStatus::Pending,
            first_seen_index,
            finalized_index: None,
        }
    }

    pub fn tally(&self) -> (u32, u32, u32) {
        let mut approve = 0u32;
        let mut reject = 0u32;
        let mut abstain = 0u32;
        for v in self.votes.values() {
            match v {
                Vote::Approve => approve += 1,
                Vote::Reject => reject += 1,
                Vote::Abstain => abstain += 1,
            }
        }
        (approve, reject, abstain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_approval_is_pending_with_no_finality() {
        let a = Approval::new("a1".into(), b"loan-42".to_vec(), 5, 1, LogIndex(3));
        assert_eq!(a.status, ApprovalStatus::Pending);
        assert!(a.finalized_index.is_none());
        assert_eq!(a.tally(), (0, 0, 0));
    }
}
