use crate::ids::{ClientRequestId, Term};
use serde::{Deserialize, Serialize};

/// 1-based, dense, strictly monotonic per node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogIndex(pub u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);
    pub const FIRST: LogIndex = LogIndex(1);

    pub fn next(self) -> LogIndex {
        LogIndex(self.0 + 1)
    }

    pub fn prev(self) -> Option<LogIndex> {
        self.0.checked_sub(1).map(LogIndex)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    ApprovalCreate,
    Vote,
    Command,
    NoOp,
}

/// An atomic replicated fact. `payload` is opaque to the log replicator;
/// only the state projector interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: LogIndex,
    pub term: Term,
    pub kind: LogKind,
    pub payload: Vec<u8>,
    pub client_request_id: Option<ClientRequestId>,
}

impl LogEntry {
    pub fn no_op(index: LogIndex, term: Term) -> Self {
        LogEntry {
            index,
            term,
            kind: LogKind::NoOp,
            payload: Vec::new(),
            client_request_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_is_identity() {
        let entry = LogEntry {
            index: LogIndex(7),
            term: Term(3),
            kind: LogKind::Command,
            payload: vec![1, 2, 3],
            client_request_id: Some(ClientRequestId("req-1".into())),
        };
        let encoded = serde_json::to_vec(&entry).unwrap();
        let decoded: LogEntry = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn first_entry_is_index_one() {
        assert_eq!(LogIndex::FIRST, LogIndex(1));
        assert_eq!(LogIndex::ZERO.next(), LogIndex::FIRST);
    }
}
