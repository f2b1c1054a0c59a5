use crate::emitter::{ApprovalFinalized, FinalityEmitter};
use crate::error::{ProjectorError, ProjectorResult};
use crate::metrics::ProjectorMetrics;
use crate::payload::{ApprovalCreatePayload, VotePayload};
use crate::pending::PendingVoteBuffer;
use hyperraft_storage::ApprovalView;
use hyperraft_types::{approval_threshold, Approval, ApprovalStatus, LogEntry, LogIndex, LogKind};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Default number of committed indices a vote for an unknown approval is
/// held before being dropped.
pub const DEFAULT_PENDING_VOTE_RETENTION: u64 = 10_000;

/// Deterministic fold of the committed log into the approval key-value
/// view. Pinned to a single task by convention (see `hyperraft-node`); two
/// concurrent callers of `apply` would race on `last_applied_index`.
pub struct Projector<V: ApprovalView, E: FinalityEmitter> {
    view: Arc<V>,
    emitter: Arc<E>,
    metrics: Arc<ProjectorMetrics>,
    pending: Mutex<PendingVoteBuffer>,
}

impl<V: ApprovalView, E: FinalityEmitter> Projector<V, E> {
    pub fn new(view: Arc<V>, emitter: Arc<E>, metrics: Arc<ProjectorMetrics>) -> Self {
        Projector {
            view,
            emitter,
            metrics,
            pending: Mutex::new(PendingVoteBuffer::new(DEFAULT_PENDING_VOTE_RETENTION)),
        }
    }

    pub fn with_retention(
        view: Arc<V>,
        emitter: Arc<E>,
        metrics: Arc<ProjectorMetrics>,
        retention_window: u64,
    ) -> Self {
        Projector {
            view,
            emitter,
            metrics,
            pending: Mutex::new(PendingVoteBuffer::new(retention_window)),
        }
    }

    pub async fn get_approval(&self, approval_id: &str) -> ProjectorResult<Option<Approval>> {
        Ok(self.view.get(approval_id).await?)
    }

    pub async fn last_applied_index(&self) -> ProjectorResult<LogIndex> {
        Ok(self.view.last_applied_index().await?)
    }

    /// Applies one committed entry. Must be called exactly once per index,
    /// in order; `ApprovalCreate`/`Vote` entries advance the approval view,
    /// everything else is a no-op for this component.
    #[instrument(skip(self, entry), fields(index = entry.index.0, kind = ?entry.kind))]
    pub async fn apply(&self, entry: &LogEntry) -> ProjectorResult<()> {
        let last_applied = self.view.last_applied_index().await?;
        if entry.index <= last_applied {
            // Already applied; Apply must be idempotent against restart
            // replay from the last durable watermark.
            debug!("skipping already-applied entry");
            return Ok(());
        }
        if entry.index != last_applied.next() {
            return Err(ProjectorError::OutOfOrder {
                expected: last_applied.next(),
                got: entry.index,
            });
        }

        let finalized = match entry.kind {
            LogKind::ApprovalCreate => self.apply_create(entry).await?,
            LogKind::Vote => self.apply_vote(entry).await?,
            LogKind::Command | LogKind::NoOp => {
                self.view.apply_batch(Vec::new(), entry.index).await?;
                None
            }
        };

        self.metrics.last_applied_index.set(entry.index.0 as i64);

        let expired = self.pending.lock().gc(entry.index);
        if !expired.is_empty() {
            self.metrics
                .pending_votes_expired
                .inc_by(expired.len() as u64);
            for approval_id in expired {
                warn!(approval_id, "pending votes expired with no ApprovalCreate");
            }
        }

        if let Some(event) = finalized {
            self.metrics.approvals_finalized.inc();
            self.emitter.emit(event).await;
        }

        Ok(())
    }

    async fn apply_create(&self, entry: &LogEntry) -> ProjectorResult<Option<ApprovalFinalized>> {
        let payload: ApprovalCreatePayload = serde_json::from_slice(&entry.payload)
            .map_err(|e| ProjectorError::MalformedPayload(e.to_string()))?;

        if self.view.get(&payload.approval_id).await?.is_some() {
            warn!(
                approval_id = payload.approval_id,
                "duplicate ApprovalCreate for an approval that already exists, ignoring"
            );
            self.view.apply_batch(Vec::new(), entry.index).await?;
            return Ok(None);
        }

        let mut approval = Approval::new(
            payload.approval_id.clone(),
            payload.subject,
            payload.quorum_size,
            payload.fault_tolerance,
            entry.index,
        );

        let replayed = self.pending.lock().take(&payload.approval_id);
        for (voter_id, vote) in replayed {
            approval.votes.insert(voter_id, vote);
        }

        let finalized = finalize_if_threshold_met(&mut approval, entry.index);
        self.metrics.approvals_created.inc();
        self.view.apply_batch(vec![approval], entry.index).await?;
        Ok(finalized)
    }

    async fn apply_vote(&self, entry: &LogEntry) -> ProjectorResult<Option<ApprovalFinalized>> {
        let payload: VotePayload = serde_json::from_slice(&entry.payload)
            .map_err(|e| ProjectorError::MalformedPayload(e.to_string()))?;
        self.metrics.votes_applied.inc();

        let Some(mut approval) = self.view.get(&payload.approval_id).await? else {
            self.pending.lock().push(
                &payload.approval_id,
                payload.voter_id,
                payload.vote,
                entry.index,
            );
            self.view.apply_batch(Vec::new(), entry.index).await?;
            return Ok(None);
        };

        // Last-write-wins, recorded even after finalization (for audit);
        // the threshold check below only fires while still Pending.
        approval.votes.insert(payload.voter_id, payload.vote);

        let finalized = if approval.status == ApprovalStatus::Pending {
            finalize_if_threshold_met(&mut approval, entry.index)
        } else {
            None
        };

        self.view.apply_batch(vec![approval], entry.index).await?;
        Ok(finalized)
    }
}

fn finalize_if_threshold_met(approval: &mut Approval, index: LogIndex) -> Option<ApprovalFinalized> {
    let (approve, reject, _abstain) = approval.tally();
    let threshold = approval_threshold(approval.quorum_size, approval.fault_tolerance);

    let new_status = if approve >= threshold {
        Some(ApprovalStatus::Approved)
    } else if reject >= threshold {
        Some(ApprovalStatus::Rejected)
    } else {
        None
    };

    let Some(status) = new_status else {
        return None;
    };

    approval.status = status;
    approval.finalized_index = Some(index);
    Some(ApprovalFinalized {
        approval_id: approval.approval_id.clone(),
        status,
        finalized_index: index,
    })
}
