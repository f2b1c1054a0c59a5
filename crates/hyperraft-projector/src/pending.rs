use hyperraft_types::{LogIndex, Vote, VoterId};
use std::collections::BTreeMap;

/// Votes that named an `approvalID` with no `ApprovalCreate` applied yet.
/// Held so that a Create arriving later can replay them in order; dropped
/// wholesale once `retention_window` committed indices have passed since
/// the oldest vote in the group, so an `ApprovalCreate` that never arrives
/// does not leak memory forever.
///
/// Expiry is keyed on log index rather than wall-clock time: the projector
/// must be a pure function of the prior state and the entry being applied,
/// and index progression is the only "time" that is part of that input.
pub struct PendingVoteBuffer {
    retention_window: u64,
    groups: BTreeMap<String, Vec<(VoterId, Vote, LogIndex)>>,
}

impl PendingVoteBuffer {
    pub fn new(retention_window: u64) -> Self {
        PendingVoteBuffer {
            retention_window,
            groups: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, approval_id: &str, voter_id: VoterId, vote: Vote, index: LogIndex) {
        self.groups
            .entry(approval_id.to_string())
            .or_default()
            .push((voter_id, vote, index));
    }

    /// Removes and returns the buffered votes for `approval_id`, in the
    /// order they arrived, so the caller can replay them onto a freshly
    /// created `Approval`.
    pub fn take(&mut self, approval_id: &str) -> Vec<(VoterId, Vote)> {
        self.groups
            .remove(approval_id)
            .map(|entries| entries.into_iter().map(|(v, t, _)| (v, t)).collect())
            .unwrap_or_default()
    }

    /// Drops any group whose oldest vote is more than `retention_window`
    /// indices behind `current_index`. Returns the dropped approval ids.
    pub fn gc(&mut self, current_index: LogIndex) -> Vec<String> {
        let mut expired = Vec::new();
        self.groups.retain(|approval_id, votes| {
            let oldest = votes.iter().map(|(_, _, idx)| idx.0).min().unwrap_or(0);
            let expire = current_index.0.saturating_sub(oldest) > self.retention_window;
            if expire {
                expired.push(approval_id.clone());
            }
            !expire
        });
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_votes_in_arrival_order_and_clears_group() {
        let mut buf = PendingVoteBuffer::new(100);
        buf.push("a1", VoterId("v1".into()), Vote::Approve, LogIndex(1));
        buf.push("a1", VoterId("v2".into()), Vote::Reject, LogIndex(2));
        let taken = buf.take("a1");
        assert_eq!(taken.len(), 2);
        assert!(buf.take("a1").is_empty());
    }

    #[test]
    fn gc_drops_groups_older_than_the_retention_window() {
        let mut buf = PendingVoteBuffer::new(5);
        buf.push("a1", VoterId("v1".into()), Vote::Approve, LogIndex(1));
        let expired = buf.gc(LogIndex(10));
        assert_eq!(expired, vec!["a1".to_string()]);
        assert!(buf.take("a1").is_empty());
    }

    #[test]
    fn gc_keeps_groups_within_the_retention_window() {
        let mut buf = PendingVoteBuffer::new(5);
        buf.push("a1", VoterId("v1".into()), Vote::Approve, LogIndex(1));
        let expired = buf.gc(LogIndex(4));
        assert!(expired.is_empty());
        assert_eq!(buf.take("a1").len(), 1);
    }
}
