use hyperraft_types::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
}

/// Static cluster membership for one consensus group. Reconfiguration is not
/// supported; a membership change means redeploying with a new `ClusterConfig`.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    pub self_id: NodeId,
    pub peers: Vec<NodeId>,
    pub fault_tolerance: u32,
}

impl ClusterConfig {
    /// Total voting members including this node.
    pub fn quorum_size(&self) -> u32 {
        self.peers.len() as u32 + 1
    }

    /// Votes (including the candidate's own) needed to win an election:
    /// a simple majority of `quorum_size`.
    pub fn election_majority(&self) -> u32 {
        self.quorum_size() / 2 + 1
    }
}
