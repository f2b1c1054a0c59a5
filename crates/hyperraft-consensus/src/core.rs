use crate::error::{ConsensusError, ConsensusResult};
use crate::messages::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse, SignedAck,
};
use crate::metrics::ConsensusMetrics;
use crate::signer::Signer;
use crate::state::{ClusterConfig, NodeRole};
use crate::transport::Transport;
use hyperraft_clock::Clock;
use hyperraft_storage::LogStore;
use hyperraft_types::{ClientRequestId, LogEntry, LogIndex, LogKind, NodeId, Term};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

const RPC_TIMEOUT: Duration = Duration::from_millis(500);
const COMMIT_CHANNEL_CAPACITY: usize = 4096;

pub struct ProposeCommand {
    pub kind: LogKind,
    pub payload: Vec<u8>,
    pub client_request_id: Option<ClientRequestId>,
    pub respond_to: oneshot::Sender<ConsensusResult<(LogIndex, Term)>>,
}

pub struct StatusRequest {
    pub respond_to: oneshot::Sender<NodeStatus>,
}

#[derive(Clone, Debug)]
pub struct NodeStatus {
    pub self_id: NodeId,
    pub role: NodeRole,
    pub current_term: Term,
    pub commit_index: LogIndex,
    pub current_leader: Option<NodeId>,
}

/// One inbound event the core loop's `tokio::select!` can wake up on: either
/// a peer's RPC (which expects a response down its `oneshot::Sender`) or the
/// reply to an RPC this node sent out as candidate or leader.
enum InboundEvent {
    RequestVote(RequestVoteRequest, oneshot::Sender<RequestVoteResponse>),
    AppendEntries(AppendEntriesRequest, oneshot::Sender<AppendEntriesResponse>),
    InstallSnapshot(
        InstallSnapshotRequest,
        oneshot::Sender<InstallSnapshotResponse>,
    ),
    RequestVoteReply(NodeId, RequestVoteResponse),
    AppendEntriesReply(NodeId, AppendEntriesResponse),
}

/// Server-side entry point: the network layer in `hyperraft-node` calls
/// these methods when it decodes an incoming RPC off the wire, and writes
/// back whatever they return.
#[derive(Clone)]
pub struct RpcInbox {
    tx: mpsc::Sender<InboundEvent>,
}

impl RpcInbox {
    pub async fn request_vote(
        &self,
        req: RequestVoteRequest,
    ) -> ConsensusResult<RequestVoteResponse> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(InboundEvent::RequestVote(req, respond_to))
            .await
            .map_err(|_| ConsensusError::ShuttingDown)?;
        rx.await.map_err(|_| ConsensusError::ShuttingDown)
    }

    pub async fn append_entries(
        &self,
        req: AppendEntriesRequest,
    ) -> ConsensusResult<AppendEntriesResponse> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(InboundEvent::AppendEntries(req, respond_to))
            .await
            .map_err(|_| ConsensusError::ShuttingDown)?;
        rx.await.map_err(|_| ConsensusError::ShuttingDown)
    }

    pub async fn install_snapshot(
        &self,
        req: InstallSnapshotRequest,
    ) -> ConsensusResult<InstallSnapshotResponse> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(InboundEvent::InstallSnapshot(req, respond_to))
            .await
            .map_err(|_| ConsensusError::ShuttingDown)?;
        rx.await.map_err(|_| ConsensusError::ShuttingDown)
    }
}

/// Handle for talking to a running `Core` as a client: propose entries,
/// read status, subscribe to commits. Every method is a channel round trip
/// into the single-threaded replication loop, never a direct borrow of its
/// state.
#[derive(Clone)]
pub struct ConsensusHandle {
    propose_tx: mpsc::Sender<ProposeCommand>,
    status_tx: mpsc::Sender<StatusRequest>,
    commit_tx: broadcast::Sender<LogEntry>,
}

impl ConsensusHandle {
    pub async fn propose(
        &self,
        kind: LogKind,
        payload: Vec<u8>,
        client_request_id: Option<ClientRequestId>,
    ) -> ConsensusResult<(LogIndex, Term)> {
        let (respond_to, rx) = oneshot::channel();
        self.propose_tx
            .send(ProposeCommand {
                kind,
                payload,
                client_request_id,
                respond_to,
            })
            .await
            .map_err(|_| ConsensusError::ShuttingDown)?;
        rx.await.map_err(|_| ConsensusError::ShuttingDown)?
    }

    pub async fn status(&self) -> ConsensusResult<NodeStatus> {
        let (respond_to, rx) = oneshot::channel();
        self.status_tx
            .send(StatusRequest { respond_to })
            .await
            .map_err(|_| ConsensusError::ShuttingDown)?;
        rx.await.map_err(|_| ConsensusError::ShuttingDown)
    }

    /// A fresh subscriber only observes entries committed after it
    /// subscribes; callers that need history should read the log directly.
    pub fn subscribe_committed(&self) -> broadcast::Receiver<LogEntry> {
        self.commit_tx.subscribe()
    }
}

/// Single-threaded replication loop: one `Core` owns all mutable consensus
/// state, driven entirely by messages arriving on its channels.
/// `ConsensusHandle` and `RpcInbox` are how every other task talks to it.
pub struct Core<C: Clock, T: Transport, L: LogStore, S: Signer> {
    cluster: ClusterConfig,
    clock: Arc<C>,
    transport: Arc<T>,
    log: Arc<L>,
    signer: Arc<S>,
    metrics: Arc<ConsensusMetrics>,

    role: NodeRole,
    current_term: Term,
    voted_for: Option<NodeId>,
    commit_index: LogIndex,
    current_leader: Option<NodeId>,

    next_index: HashMap<NodeId, LogIndex>,
    match_index: HashMap<NodeId, LogIndex>,
    votes_received: std::collections::HashSet<NodeId>,
    signed_acks: HashMap<LogIndex, HashMap<NodeId, SignedAck>>,

    dedup: HashMap<ClientRequestId, (LogIndex, Term)>,

    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: mpsc::Receiver<InboundEvent>,
    propose_rx: mpsc::Receiver<ProposeCommand>,
    status_rx: mpsc::Receiver<StatusRequest>,
    shutdown_rx: oneshot::Receiver<()>,
    commit_tx: broadcast::Sender<LogEntry>,
}

pub struct CoreHandles {
    pub handle: ConsensusHandle,
    pub inbox: RpcInbox,
    pub shutdown_tx: oneshot::Sender<()>,
}

impl<C: Clock + 'static, T: Transport + 'static, L: LogStore + 'static, S: Signer + 'static>
    Core<C, T, L, S>
{
    pub fn spawn(
        cluster: ClusterConfig,
        clock: Arc<C>,
        transport: Arc<T>,
        log: Arc<L>,
        signer: Arc<S>,
        metrics: Arc<ConsensusMetrics>,
    ) -> (CoreHandles, tokio::task::JoinHandle<()>) {
        let (propose_tx, propose_rx) = mpsc::channel(1024);
        let (status_tx, status_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(4096);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (commit_tx, _) = broadcast::channel(COMMIT_CHANNEL_CAPACITY);

        let core = Core {
            cluster,
            clock,
            transport,
            log,
            signer,
            metrics,
            role: NodeRole::Follower,
            current_term: Term::ZERO,
            voted_for: None,
            commit_index: LogIndex::ZERO,
            current_leader: None,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            votes_received: std::collections::HashSet::new(),
            signed_acks: HashMap::new(),
            dedup: HashMap::new(),
            inbound_tx: inbound_tx.clone(),
            inbound_rx,
            propose_rx,
            status_rx,
            shutdown_rx,
            commit_tx: commit_tx.clone(),
        };

        let handle = ConsensusHandle {
            propose_tx,
            status_tx,
            commit_tx,
        };
        let inbox = RpcInbox { tx: inbound_tx };

        let join = tokio::spawn(core.run());
        (
            CoreHandles {
                handle,
                inbox,
                shutdown_tx,
            },
            join,
        )
    }

    #[instrument(skip(self), fields(self_id = %self.cluster.self_id))]
    async fn run(mut self) {
        let mut election_deadline = Instant::now() + self.clock.election_timeout();
        let mut heartbeat_interval = tokio::time::interval(self.clock.heartbeat_interval());

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(election_deadline) => {
                    if self.role != NodeRole::Leader {
                        self.start_election().await;
                    }
                    election_deadline = Instant::now() + self.clock.election_timeout();
                }
                _ = heartbeat_interval.tick() => {
                    if self.role == NodeRole::Leader {
                        self.broadcast_append_entries().await;
                    }
                }
                Some(event) = self.inbound_rx.recv() => {
                    let reset_timer = self.handle_inbound_event(event).await;
                    if reset_timer {
                        election_deadline = Instant::now() + self.clock.election_timeout();
                    }
                }
                Some(cmd) = self.propose_rx.recv() => {
                    self.handle_propose(cmd).await;
                }
                Some(req) = self.status_rx.recv() => {
                    let _ = req.respond_to.send(self.status());
                }
                _ = &mut self.shutdown_rx => {
                    info!("consensus core shutting down");
                    break;
                }
            }
        }
    }

    fn status(&self) -> NodeStatus {
        NodeStatus {
            self_id: self.cluster.self_id.clone(),
            role: self.role,
            current_term: self.current_term,
            commit_index: self.commit_index,
            current_leader: self.current_leader.clone(),
        }
    }

    fn become_follower(&mut self, term: Term) {
        self.role = NodeRole::Follower;
        self.current_term = term;
        self.voted_for = None;
        self.votes_received.clear();
        self.metrics.current_term.set(term.0 as i64);
    }

    #[instrument(skip(self))]
    async fn start_election(&mut self) {
        self.current_term = self.current_term.next();
        self.role = NodeRole::Candidate;
        self.voted_for = Some(self.cluster.self_id.clone());
        self.votes_received.clear();
        self.votes_received.insert(self.cluster.self_id.clone());
        self.current_leader = None;
        self.metrics.current_term.set(self.current_term.0 as i64);
        self.metrics.elections_started.inc();

        let (last_log_index, last_log_term) = self
            .log
            .last_index_term()
            .await
            .unwrap_or((LogIndex::ZERO, Term::ZERO));

        debug!(term = self.current_term.0, "starting election");

        for peer in self.cluster.peers.clone() {
            let request = RequestVoteRequest {
                candidate_term: self.current_term,
                candidate_id: self.cluster.self_id.clone(),
                last_log_index,
                last_log_term,
            };
            let transport = self.transport.clone();
            let inbound_tx = self.inbound_tx.clone();
            tokio::spawn(async move {
                if let Ok(resp) = transport.request_vote(&peer, request, RPC_TIMEOUT).await {
                    let _ = inbound_tx
                        .send(InboundEvent::RequestVoteReply(peer, resp))
                        .await;
                }
            });
        }
    }

    async fn handle_inbound_event(&mut self, event: InboundEvent) -> bool {
        match event {
            InboundEvent::RequestVote(req, respond_to) => {
                let (resp, became_follower) = self.handle_request_vote(req).await;
                let _ = respond_to.send(resp);
                became_follower
            }
            InboundEvent::AppendEntries(req, respond_to) => {
                let (resp, became_follower) = self.handle_append_entries(req).await;
                let _ = respond_to.send(resp);
                became_follower
            }
            InboundEvent::InstallSnapshot(req, respond_to) => {
                let resp = self.handle_install_snapshot(req).await;
                let _ = respond_to.send(resp);
                false
            }
            InboundEvent::RequestVoteReply(voter, resp) => {
                self.handle_request_vote_reply(voter, resp).await
            }
            InboundEvent::AppendEntriesReply(follower, resp) => {
                self.handle_append_entries_reply(follower, resp).await;
                false
            }
        }
    }

    /// Returns `(response, became_follower)`; the caller resets the
    /// election timer only when this node changed term or role.
    async fn handle_request_vote(&mut self, req: RequestVoteRequest) -> (RequestVoteResponse, bool) {
        let mut became_follower = false;
        if req.candidate_term > self.current_term {
            self.become_follower(req.candidate_term);
            became_follower = true;
        }
        let (last_log_index, last_log_term) = self
            .log
            .last_index_term()
            .await
            .unwrap_or((LogIndex::ZERO, Term::ZERO));
        let log_ok = req.last_log_term > last_log_term
            || (req.last_log_term == last_log_term && req.last_log_index >= last_log_index);
        let can_vote = self.voted_for.is_none() || self.voted_for.as_ref() == Some(&req.candidate_id);
        let grant = req.candidate_term == self.current_term && can_vote && log_ok;
        if grant {
            self.voted_for = Some(req.candidate_id);
            became_follower = true;
        }
        (
            RequestVoteResponse {
                voter_term: self.current_term,
                vote_granted: grant,
            },
            became_follower,
        )
    }

    async fn handle_request_vote_reply(&mut self, voter: NodeId, resp: RequestVoteResponse) -> bool {
        if resp.voter_term > self.current_term {
            self.become_follower(resp.voter_term);
            return true;
        }
        if self.role != NodeRole::Candidate || resp.voter_term != self.current_term {
            return false;
        }
        if resp.vote_granted {
            self.votes_received.insert(voter);
            if self.votes_received.len() as u32 >= self.cluster.election_majority() {
                self.become_leader().await;
            }
        }
        false
    }

    /// Initializes `nextIndex`/`matchIndex` and emits a NoOp entry so the
    /// new leader has an entry of its own term to anchor the commit rule on
    /// (entries from earlier terms only commit indirectly, via one from the
    /// current term).
    async fn become_leader(&mut self) {
        self.role = NodeRole::Leader;
        self.current_leader = Some(self.cluster.self_id.clone());
        self.metrics.elections_won.inc();
        info!(term = self.current_term.0, "elected leader");
        for peer in &self.cluster.peers {
            self.next_index.insert(peer.clone(), LogIndex::ZERO.next());
            self.match_index.insert(peer.clone(), LogIndex::ZERO);
        }

        let (last_index, _) = self
            .log
            .last_index_term()
            .await
            .unwrap_or((LogIndex::ZERO, Term::ZERO));
        let no_op = LogEntry::no_op(last_index.next(), self.current_term);
        if self.log.append(vec![no_op]).await.is_ok() {
            self.match_index
                .insert(self.cluster.self_id.clone(), last_index.next());
        }
    }

    /// Returns `(response, became_follower)`.
    #[instrument(skip(self, req))]
    async fn handle_append_entries(
        &mut self,
        req: AppendEntriesRequest,
    ) -> (AppendEntriesResponse, bool) {
        let mut became_follower = false;
        if req.leader_term >= self.current_term {
            if req.leader_term > self.current_term || self.role != NodeRole::Follower {
                self.become_follower(req.leader_term);
                became_follower = true;
            }
            self.current_leader = Some(req.leader_id.clone());
        }

        if req.leader_term < self.current_term {
            return (
                AppendEntriesResponse {
                    follower_term: self.current_term,
                    success: false,
                    match_index: LogIndex::ZERO,
                    signed_ack: None,
                },
                became_follower,
            );
        }

        let prev_ok = if req.prev_log_index == LogIndex::ZERO {
            true
        } else {
            match self.log.read(req.prev_log_index).await.ok().flatten() {
                Some(entry) => entry.term == req.prev_log_term,
                None => false,
            }
        };

        if !prev_ok {
            self.metrics.append_entries_rejected.inc();
            return (
                AppendEntriesResponse {
                    follower_term: self.current_term,
                    success: false,
                    match_index: LogIndex::ZERO,
                    signed_ack: None,
                },
                became_follower,
            );
        }

        let mut match_index = req.prev_log_index;
        if !req.entries.is_empty() {
            if let Some(first) = req.entries.first() {
                let _ = self.log.truncate_suffix_from(first.index).await;
            }
            match_index = req.entries.last().map(|e| e.index).unwrap_or(match_index);
            let _ = self.log.append(req.entries).await;
        } else if let Ok((last_index, _)) = self.log.last_index_term().await {
            match_index = last_index;
        }

        if req.leader_commit > self.commit_index {
            self.advance_commit_index(req.leader_commit.min(match_index))
                .await;
        }

        let hash = match self.log.read(match_index).await {
            Ok(Some(entry)) => content_hash(&entry),
            _ => Vec::new(),
        };
        let message = ack_message(&self.cluster.self_id, self.current_term, match_index, &hash);
        let signed_ack = Some(SignedAck {
            voter: self.cluster.self_id.clone(),
            term: self.current_term,
            match_index,
            content_hash: hash,
            signature: self.signer.sign(&message),
        });

        (
            AppendEntriesResponse {
                follower_term: self.current_term,
                success: true,
                match_index,
                signed_ack,
            },
            became_follower,
        )
    }

    async fn advance_commit_index(&mut self, new_commit: LogIndex) {
        while self.commit_index < new_commit {
            self.commit_index = self.commit_index.next();
            self.metrics.commit_index.set(self.commit_index.0 as i64);
            if let Ok(Some(entry)) = self.log.read(self.commit_index).await {
                let _ = self.commit_tx.send(entry);
            }
        }
    }

    async fn handle_append_entries_reply(&mut self, follower: NodeId, resp: AppendEntriesResponse) {
        if resp.follower_term > self.current_term {
            self.become_follower(resp.follower_term);
            return;
        }
        if self.role != NodeRole::Leader {
            return;
        }
        if !resp.success {
            let next = self
                .next_index
                .get(&follower)
                .copied()
                .unwrap_or(LogIndex::FIRST);
            self.next_index
                .insert(follower, next.prev().unwrap_or(LogIndex::ZERO).next());
            return;
        }

        if let Some(ack) = &resp.signed_ack {
            let message = ack_message(&follower, ack.term, ack.match_index, &ack.content_hash);
            if !self.signer.verify(&follower, &message, &ack.signature) {
                // A bad signature does not change replication progress; it
                // simply never counts toward the Byzantine quorum below.
            } else {
                self.signed_acks
                    .entry(resp.match_index)
                    .or_default()
                    .insert(follower.clone(), ack.clone());
            }
        }

        self.match_index.insert(follower.clone(), resp.match_index);
        self.next_index.insert(follower, resp.match_index.next());

        self.try_advance_leader_commit().await;
    }

    /// An index commits once a majority of `match_index` values reach it
    /// AND (for Byzantine resistance) at least `quorum_size - fault_tolerance`
    /// distinct verified signed acks cover it.
    async fn try_advance_leader_commit(&mut self) {
        let quorum = self.cluster.election_majority();
        let byzantine_quorum = self.cluster.quorum_size() - self.cluster.fault_tolerance;

        // `match_index` already carries the leader's own progress: it is
        // seeded for every peer in `become_leader` and updated for `self`
        // each time `handle_propose` appends a new entry.
        let mut replicated: Vec<LogIndex> = self.match_index.values().copied().collect();
        replicated.sort_unstable_by(|a, b| b.cmp(a));
        let majority_index = replicated
            .get(quorum as usize - 1)
            .copied()
            .unwrap_or(LogIndex::ZERO);

        if majority_index <= self.commit_index {
            return;
        }

        // Only acks whose content hash matches the leader's own entry at
        // this index count: a Byzantine leader forking payloads across two
        // subsets of followers at the same (index, term) splits their acks
        // into two hashes, neither of which can reach quorum on its own.
        let entry = match self.log.read(majority_index).await {
            Ok(Some(entry)) => entry,
            _ => return,
        };

        // A leader may only commit by counting match_index over an entry
        // from its own term; a prior-term entry is committed indirectly,
        // once a current-term entry on top of it reaches quorum. Committing
        // it directly on matchIndex-majority alone can be undone by a later
        // leader that never replicated it.
        if entry.term != self.current_term {
            return;
        }
        let own_hash = content_hash(&entry);

        let signer_count = self
            .signed_acks
            .get(&majority_index)
            .map(|acks| {
                acks.values()
                    .filter(|ack| ack.content_hash == own_hash)
                    .count() as u32
                    + 1 // the leader's own implicit ack
            })
            .unwrap_or(1);

        if signer_count >= byzantine_quorum {
            self.advance_commit_index(majority_index).await;
        }
    }

    async fn handle_install_snapshot(
        &mut self,
        _req: InstallSnapshotRequest,
    ) -> InstallSnapshotResponse {
        // Snapshotting/compaction is out of scope for the replication core
        // itself; a real deployment wires log compaction in at the storage
        // layer and this handler becomes a real state transfer.
        InstallSnapshotResponse {
            follower_term: self.current_term,
        }
    }

    #[instrument(skip(self))]
    async fn broadcast_append_entries(&mut self) {
        let (last_index, _) = self
            .log
            .last_index_term()
            .await
            .unwrap_or((LogIndex::ZERO, Term::ZERO));
        for peer in self.cluster.peers.clone() {
            let next = self
                .next_index
                .get(&peer)
                .copied()
                .unwrap_or(last_index.next());
            let prev_index = next.prev().unwrap_or(LogIndex::ZERO);
            let prev_term = if prev_index == LogIndex::ZERO {
                Term::ZERO
            } else {
                self.log
                    .read(prev_index)
                    .await
                    .ok()
                    .flatten()
                    .map(|e| e.term)
                    .unwrap_or(Term::ZERO)
            };
            let entries = self
                .log
                .read_range(next, last_index)
                .await
                .unwrap_or_default();
            let request = AppendEntriesRequest {
                leader_term: self.current_term,
                leader_id: self.cluster.self_id.clone(),
                prev_log_index: prev_index,
                prev_log_term: prev_term,
                entries,
                leader_commit: self.commit_index,
            };
            self.metrics.append_entries_sent.inc();
            let transport = self.transport.clone();
            let inbound_tx = self.inbound_tx.clone();
            tokio::spawn(async move {
                if let Ok(resp) = transport.append_entries(&peer, request, RPC_TIMEOUT).await {
                    let _ = inbound_tx
                        .send(InboundEvent::AppendEntriesReply(peer, resp))
                        .await;
                }
            });
        }
    }

    #[instrument(skip(self, cmd))]
    async fn handle_propose(&mut self, cmd: ProposeCommand) {
        if self.role != NodeRole::Leader {
            let err = match &self.current_leader {
                Some(_) => ConsensusError::NotLeader(self.cluster.self_id.clone()),
                None => ConsensusError::LeaderUnknown,
            };
            let _ = cmd.respond_to.send(Err(err));
            return;
        }

        if let Some(id) = &cmd.client_request_id {
            if let Some(existing) = self.dedup.get(id) {
                let _ = cmd.respond_to.send(Ok(*existing));
                return;
            }
        }

        let (last_index, _) = self
            .log
            .last_index_term()
            .await
            .unwrap_or((LogIndex::ZERO, Term::ZERO));
        let index = last_index.next();
        let entry = LogEntry {
            index,
            term: self.current_term,
            kind: cmd.kind,
            payload: cmd.payload,
            client_request_id: cmd.client_request_id.clone(),
        };

        if let Err(err) = self.log.append(vec![entry]).await {
            let _ = cmd.respond_to.send(Err(ConsensusError::Storage(err)));
            return;
        }

        self.match_index
            .insert(self.cluster.self_id.clone(), index);

        if let Some(id) = cmd.client_request_id {
            self.dedup.insert(id, (index, self.current_term));
        }

        self.broadcast_append_entries().await;
        self.try_advance_leader_commit().await;

        let _ = cmd.respond_to.send(Ok((index, self.current_term)));
    }
}

/// Signs over (messageType, term, senderID, contentHash), per the envelope
/// every signed wire message uses. `match_index` is folded in too since
/// it disambiguates acks for entries that happen to hash identically.
fn ack_message(voter: &NodeId, term: Term, match_index: LogIndex, content_hash: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32 + content_hash.len());
    bytes.extend_from_slice(b"append_ack");
    bytes.extend_from_slice(voter.0.as_bytes());
    bytes.extend_from_slice(&term.0.to_be_bytes());
    bytes.extend_from_slice(&match_index.0.to_be_bytes());
    bytes.extend_from_slice(content_hash);
    bytes
}

fn content_hash(entry: &LogEntry) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(entry.index.0.to_be_bytes());
    hasher.update(entry.term.0.to_be_bytes());
    hasher.update(&entry.payload);
    hasher.finalize().to_vec()
}

/// Drives a `Core` directly, without `spawn`'s background task or any real
/// networking, so handler methods can be called and private state inspected
/// in lockstep.
#[cfg(test)]
mod byzantine_quorum_tests {
    use super::*;
    use async_trait::async_trait;
    use hyperraft_clock::SimClock;
    use hyperraft_storage::memory::MemoryLogStore;
    use prometheus::Registry;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn request_vote(
            &self,
            peer: &NodeId,
            _request: RequestVoteRequest,
            _timeout: Duration,
        ) -> crate::transport::TransportResult<RequestVoteResponse> {
            Err(crate::transport::TransportError::Unreachable(
                peer.clone(),
                "no network in this test".into(),
            ))
        }

        async fn append_entries(
            &self,
            peer: &NodeId,
            _request: AppendEntriesRequest,
            _timeout: Duration,
        ) -> crate::transport::TransportResult<AppendEntriesResponse> {
            Err(crate::transport::TransportError::Unreachable(
                peer.clone(),
                "no network in this test".into(),
            ))
        }

        async fn install_snapshot(
            &self,
            peer: &NodeId,
            _request: InstallSnapshotRequest,
            _timeout: Duration,
        ) -> crate::transport::TransportResult<InstallSnapshotResponse> {
            Err(crate::transport::TransportError::Unreachable(
                peer.clone(),
                "no network in this test".into(),
            ))
        }
    }

    fn secrets(ids: &[NodeId]) -> HashMap<NodeId, Vec<u8>> {
        ids.iter()
            .map(|id| (id.clone(), format!("secret-{id}").into_bytes()))
            .collect()
    }

    fn make_leader(
        self_id: NodeId,
        peers: Vec<NodeId>,
        secrets_map: HashMap<NodeId, Vec<u8>>,
    ) -> Core<SimClock, NullTransport, MemoryLogStore, crate::signer::HmacSigner> {
        let cluster = ClusterConfig {
            self_id: self_id.clone(),
            peers,
            fault_tolerance: 1,
        };
        let clock = Arc::new(SimClock::new(Duration::from_millis(150), 42));
        let transport = Arc::new(NullTransport);
        let log = Arc::new(MemoryLogStore::new());
        let signer = Arc::new(crate::signer::HmacSigner::new(self_id, secrets_map));
        let registry = Registry::new();
        let metrics = Arc::new(ConsensusMetrics::new(&registry));

        let (_propose_tx, propose_rx) = mpsc::channel(16);
        let (_status_tx, status_rx) = mpsc::channel(16);
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let (commit_tx, _) = broadcast::channel(16);

        Core {
            cluster,
            clock,
            transport,
            log,
            signer,
            metrics,
            role: NodeRole::Follower,
            current_term: Term::ZERO,
            voted_for: None,
            commit_index: LogIndex::ZERO,
            current_leader: None,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            votes_received: std::collections::HashSet::new(),
            signed_acks: HashMap::new(),
            dedup: HashMap::new(),
            inbound_tx,
            inbound_rx,
            propose_rx,
            status_rx,
            shutdown_rx,
            commit_tx,
        }
    }

    /// A Byzantine leader sends two different payloads for the same
    /// (index, term) to two subsets of followers. Each subset's acks hash
    /// differently, so neither reaches the `quorum_size - fault_tolerance`
    /// signed acks needed to commit; the index never advances.
    #[tokio::test]
    async fn conflicting_content_hashes_never_merge_into_one_quorum() {
        let self_id = NodeId::from("n1");
        let peers: Vec<NodeId> = ["n2", "n3", "n4", "n5"]
            .into_iter()
            .map(NodeId::from)
            .collect();
        let all_ids: Vec<NodeId> = std::iter::once(self_id.clone())
            .chain(peers.iter().cloned())
            .collect();
        let secrets_map = secrets(&all_ids);

        let mut core = make_leader(self_id.clone(), peers, secrets_map.clone());
        core.current_term = Term(4);
        core.become_leader().await;

        let (respond_to, response_rx) = oneshot::channel();
        core.handle_propose(ProposeCommand {
            kind: LogKind::Command,
            payload: b"real-payload".to_vec(),
            client_request_id: None,
            respond_to,
        })
        .await;
        let (index, term) = response_rx
            .await
            .unwrap()
            .expect("leader accepts its own proposal");

        let real_entry = core.log.read(index).await.unwrap().unwrap();
        let real_hash = content_hash(&real_entry);
        let forged_entry = LogEntry {
            index,
            term,
            kind: LogKind::Command,
            payload: b"forged-payload".to_vec(),
            client_request_id: None,
        };
        let forged_hash = content_hash(&forged_entry);
        assert_ne!(real_hash, forged_hash);

        for (peer_name, hash) in [
            ("n2", &real_hash),
            ("n3", &real_hash),
            ("n4", &forged_hash),
            ("n5", &forged_hash),
        ] {
            let peer = NodeId::from(peer_name);
            let peer_signer = crate::signer::HmacSigner::new(peer.clone(), secrets_map.clone());
            let message = ack_message(&peer, term, index, hash);
            let signed_ack = SignedAck {
                voter: peer.clone(),
                term,
                match_index: index,
                content_hash: hash.clone(),
                signature: peer_signer.sign(&message),
            };
            core.handle_append_entries_reply(
                peer,
                AppendEntriesResponse {
                    follower_term: term,
                    success: true,
                    match_index: index,
                    signed_ack: Some(signed_ack),
                },
            )
            .await;
        }

        assert_eq!(
            core.commit_index,
            LogIndex::ZERO,
            "neither forked payload reaches the byzantine quorum of 4"
        );
    }
}
