//! Shared data model for the HyperRAFT++ ledger core.
//!
//! Every other crate in the workspace depends on this one and only this one
//! for the shapes of `LogEntry`, `Approval` and `Delivery`; nothing here talks
//! to a store, a socket, or a clock.

mod approval;
mod delivery;
mod ids;
mod log_entry;

pub use approval::{Approval, ApprovalStatus, Vote};
pub use delivery::{Delivery, DeliveryStatus};
pub use ids::{ClientRequestId, NodeId, Term, VoterId};
pub use log_entry::{LogEntry, LogIndex, LogKind};

/// `ceil((n + f + 1) / 2)` — the vote threshold used by the vote aggregator
/// to flip `Approval::status` out of `Pending`.
pub fn approval_threshold(quorum_size: u32, fault_tolerance: u32) -> u32 {
    let numerator = quorum_size + fault_tolerance + 1;
    (numerator + 1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_matches_scenario_a() {
        // N=5, f=1 -> ceil(7/2) = 4
        assert_eq!(approval_threshold(5, 1), 4);
    }

    #[test]
    fn threshold_matches_boundary_example() {
        // quorumSize=4, faultTolerance=1 -> ceil(6/2) = 3
        assert_eq!(approval_threshold(4, 1), 3);
    }
}
