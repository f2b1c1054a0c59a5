//! In-memory reference implementations of the three store traits. Used by
//! every crate's tests and by single-process demo deployments; not durable
//! across process restart.

use crate::delivery_store::{AckOutcome, ClaimOutcome, DeliveryStore};
use crate::log_store::LogStore;
use crate::vote_store::ApprovalView;
use crate::{partition_of, StorageError, StorageResult};
use async_trait::async_trait;
use hyperraft_types::{Approval, Delivery, DeliveryStatus, LogEntry, LogIndex, Term};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, entries: Vec<LogEntry>) -> StorageResult<()> {
        let mut log = self.entries.lock();
        for entry in entries {
            let expected = LogIndex(log.len() as u64 + 1);
            if entry.index != expected {
                return Err(StorageError::Io(format!(
                    "non-contiguous append: expected index {:?}, got {:?}",
                    expected, entry.index
                )));
            }
            log.push(entry);
        }
        Ok(())
    }

    async fn truncate_suffix_from(&self, index: LogIndex) -> StorageResult<()> {
        let mut log = self.entries.lock();
        let keep = index.0.saturating_sub(1) as usize;
        log.truncate(keep);
        Ok(())
    }

    async fn read(&self, index: LogIndex) -> StorageResult<Option<LogEntry>> {
        let log = self.entries.lock();
        if index.0 == 0 {
            return Ok(None);
        }
        Ok(log.get(index.0 as usize - 1).cloned())
    }

    async fn read_range(&self, lo: LogIndex, hi: LogIndex) -> StorageResult<Vec<LogEntry>> {
        let log = self.entries.lock();
        if lo.0 == 0 || hi.0 < lo.0 {
            return Ok(Vec::new());
        }
        let start = (lo.0 - 1) as usize;
        let end = (hi.0 as usize).min(log.len());
        if start >= log.len() {
            return Ok(Vec::new());
        }
        Ok(log[start..end].to_vec())
    }

    async fn last_index_term(&self) -> StorageResult<(LogIndex, Term)> {
        let log = self.entries.lock();
        match log.last() {
            Some(e) => Ok((e.index, e.term)),
            None => Ok((LogIndex::ZERO, Term::ZERO)),
        }
    }

    async fn sync(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryApprovalView {
    inner: Mutex<(BTreeMap<String, Approval>, LogIndex)>,
}

impl MemoryApprovalView {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalView for MemoryApprovalView {
    async fn get(&self, approval_id: &str) -> StorageResult<Option<Approval>> {
        let (map, _) = &*self.inner.lock();
        Ok(map.get(approval_id).cloned())
    }

    async fn apply_batch(
        &self,
        approvals: Vec<Approval>,
        applied_through: LogIndex,
    ) -> StorageResult<()> {
        let mut guard = self.inner.lock();
        if applied_through < guard.1 {
            return Err(StorageError::Corrupt(format!(
                "apply_batch watermark went backwards: {:?} -> {:?}",
                guard.1, applied_through
            )));
        }
        for approval in approvals {
            guard.0.insert(approval.approval_id.clone(), approval);
        }
        guard.1 = applied_through;
        Ok(())
    }

    async fn last_applied_index(&self) -> StorageResult<LogIndex> {
        Ok(self.inner.lock().1)
    }
}

struct DeliveryInner {
    deliveries: HashMap<String, Delivery>,
    queues: HashMap<u32, Vec<String>>,
    leases: HashMap<String, u64>,
    dead_letter: HashMap<u32, Vec<String>>,
    num_partitions: u32,
}

pub struct MemoryDeliveryStore {
    inner: Mutex<DeliveryInner>,
}

impl MemoryDeliveryStore {
    pub fn new(num_partitions: u32) -> Self {
        MemoryDeliveryStore {
            inner: Mutex::new(DeliveryInner {
                deliveries: HashMap::new(),
                queues: HashMap::new(),
                leases: HashMap::new(),
                dead_letter: HashMap::new(),
                num_partitions,
            }),
        }
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn enqueue(&self, delivery: Delivery) -> StorageResult<()> {
        let mut guard = self.inner.lock();
        if guard.deliveries.contains_key(&delivery.delivery_id) {
            return Ok(());
        }
        let partition = partition_of(&delivery.webhook_id, guard.num_partitions);
        guard
            .queues
            .entry(partition)
            .or_default()
            .push(delivery.delivery_id.clone());
        guard.deliveries.insert(delivery.delivery_id.clone(), delivery);
        Ok(())
    }

    async fn claim(
        &self,
        partition: u32,
        lease_expires_millis: u64,
        now_millis: u64,
    ) -> StorageResult<ClaimOutcome> {
        let mut guard = self.inner.lock();
        let queue = guard.queues.entry(partition).or_default().clone();
        let mut chosen: Option<(usize, String)> = None;
        for (pos, id) in queue.iter().enumerate() {
            let still_leased = guard
                .leases
                .get(id)
                .map(|expiry| *expiry > now_millis)
                .unwrap_or(false);
            if still_leased {
                continue;
            }
            let ready = guard
                .deliveries
                .get(id)
                .map(|d| d.scheduled_at_millis <= now_millis)
                .unwrap_or(false);
            if ready {
                chosen = Some((pos, id.clone()));
                break;
            }
        }
        let Some((pos, id)) = chosen else {
            return Ok(ClaimOutcome::Empty);
        };
        guard.queues.get_mut(&partition).unwrap().remove(pos);
        guard.leases.insert(id.clone(), lease_expires_millis);
        let delivery = guard.deliveries.get_mut(&id).unwrap();
        delivery.status = DeliveryStatus::InFlight;
        Ok(ClaimOutcome::Claimed(delivery.clone()))
    }

    async fn ack(
        &self,
        delivery_id: &str,
        outcome: AckOutcome,
        last_error: Option<String>,
        response_latency_millis: Option<u64>,
    ) -> StorageResult<()> {
        let mut guard = self.inner.lock();
        guard.leases.remove(delivery_id);
        let partition = {
            let delivery = guard
                .deliveries
                .get_mut(delivery_id)
                .ok_or_else(|| StorageError::Io(format!("unknown delivery {delivery_id}")))?;
            delivery.status = match outcome {
                AckOutcome::Delivered => DeliveryStatus::Delivered,
                AckOutcome::DeadLettered => DeliveryStatus::DeadLettered,
            };
            delivery.last_error = last_error;
            delivery.response_latency_millis = response_latency_millis;
            partition_of(&delivery.webhook_id, guard.num_partitions)
        };
        if outcome == AckOutcome::DeadLettered {
            guard
                .dead_letter
                .entry(partition)
                .or_default()
                .push(delivery_id.to_string());
        }
        Ok(())
    }

    async fn requeue(
        &self,
        delivery_id: &str,
        new_scheduled_at_millis: u64,
        last_error: Option<String>,
    ) -> StorageResult<()> {
        let mut guard = self.inner.lock();
        guard.leases.remove(delivery_id);
        let partition = {
            let delivery = guard
                .deliveries
                .get_mut(delivery_id)
                .ok_or_else(|| StorageError::Io(format!("unknown delivery {delivery_id}")))?;
            delivery.attempt += 1;
            delivery.scheduled_at_millis = new_scheduled_at_millis;
            delivery.status = DeliveryStatus::Pending;
            delivery.last_error = last_error;
            partition_of(&delivery.webhook_id, guard.num_partitions)
        };
        guard
            .queues
            .entry(partition)
            .or_default()
            .push(delivery_id.to_string());
        Ok(())
    }

    async fn depth(&self, partition: u32) -> StorageResult<usize> {
        let guard = self.inner.lock();
        Ok(guard.queues.get(&partition).map(|q| q.len()).unwrap_or(0))
    }

    async fn list_dead_lettered(&self, partition: u32) -> StorageResult<Vec<Delivery>> {
        let guard = self.inner.lock();
        Ok(guard
            .dead_letter
            .get(&partition)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| guard.deliveries.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}
