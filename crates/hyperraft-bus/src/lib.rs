//! In-process publish/subscribe from the projector's committed-entry
//! events to downstream consumers, notably the delivery queue enqueuer.
//!
//! Single producer, multiple subscribers. Lossless for the lifetime of the
//! process: a subscriber that cannot keep up blocks the producer rather
//! than having events dropped underneath it. Subscribers are themselves
//! required to be idempotent keyed on `finalized_index`, since a process
//! restart replays the projector from its last durable watermark and may
//! re-publish events a subscriber already saw.

mod metrics;

pub use metrics::BusMetrics;

use async_trait::async_trait;
use hyperraft_projector::{ApprovalFinalized, FinalityEmitter};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

struct Subscriber {
    tx: mpsc::Sender<ApprovalFinalized>,
}

/// The bus itself. Implements `FinalityEmitter` so a `Projector` can use it
/// directly as its sink; also the type subscribers register against.
pub struct FinalityBus {
    subscribers: Mutex<Vec<Subscriber>>,
    subscriber_capacity: usize,
    metrics: Arc<BusMetrics>,
}

impl FinalityBus {
    pub fn new(metrics: Arc<BusMetrics>) -> Self {
        FinalityBus {
            subscribers: Mutex::new(Vec::new()),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            metrics,
        }
    }

    pub fn with_capacity(metrics: Arc<BusMetrics>, subscriber_capacity: usize) -> Self {
        FinalityBus {
            subscribers: Mutex::new(Vec::new()),
            subscriber_capacity,
            metrics,
        }
    }

    /// Registers a new subscriber and returns its receiving half. The
    /// subscriber only observes events published after this call; it does
    /// not replay history (the projector is the source of replay, driven by
    /// its own durable watermark on restart).
    pub fn subscribe(&self) -> mpsc::Receiver<ApprovalFinalized> {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.subscribers.lock().push(Subscriber { tx });
        self.metrics.subscribers.set(self.subscribers.lock().len() as i64);
        rx
    }

    /// Delivers `event` to every live subscriber, waiting for each one's
    /// channel to have room. A subscriber whose receiver has been dropped
    /// is pruned instead of blocking forever on it.
    pub async fn publish(&self, event: ApprovalFinalized) {
        let senders: Vec<mpsc::Sender<ApprovalFinalized>> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| s.tx.clone())
            .collect();

        let mut dead = 0usize;
        for sender in &senders {
            if sender.capacity() == 0 {
                self.metrics.publish_blocked_total.inc();
                debug!(approval_id = %event.approval_id, "finality bus backpressure: blocking on a full subscriber");
            }
            if sender.send(event.clone()).await.is_err() {
                dead += 1;
            }
        }
        self.metrics.events_published.inc();

        if dead > 0 {
            self.subscribers.lock().retain(|s| !s.tx.is_closed());
            self.metrics.subscribers.set(self.subscribers.lock().len() as i64);
            warn!(dead, "pruned closed finality bus subscribers");
        }
    }
}

#[async_trait]
impl FinalityEmitter for FinalityBus {
    async fn emit(&self, event: ApprovalFinalized) {
        self.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperraft_types::{ApprovalStatus, LogIndex};
    use prometheus::Registry;

    fn event(id: &str, index: u64) -> ApprovalFinalized {
        ApprovalFinalized {
            approval_id: id.to_string(),
            status: ApprovalStatus::Approved,
            finalized_index: LogIndex(index),
        }
    }

    fn bus() -> FinalityBus {
        let registry = Registry::new();
        FinalityBus::new(Arc::new(BusMetrics::new(&registry)))
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_event() {
        let bus = bus();
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.publish(event("a1", 1)).await;

        assert_eq!(sub1.recv().await.unwrap().approval_id, "a1");
        assert_eq!(sub2.recv().await.unwrap().approval_id, "a1");
    }

    #[tokio::test]
    async fn publish_blocks_until_a_full_subscriber_drains() {
        let bus = FinalityBus::with_capacity(Arc::new(BusMetrics::new(&Registry::new())), 1);
        let mut sub = bus.subscribe();

        bus.publish(event("a1", 1)).await;

        let bus = Arc::new(bus);
        let bus_clone = bus.clone();
        let publish_task = tokio::spawn(async move {
            bus_clone.publish(event("a2", 2)).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!publish_task.is_finished());

        assert_eq!(sub.recv().await.unwrap().approval_id, "a1");
        publish_task.await.unwrap();
        assert_eq!(sub.recv().await.unwrap().approval_id, "a2");
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_without_blocking_future_publishes() {
        let bus = bus();
        {
            let _sub = bus.subscribe();
        }
        bus.publish(event("a1", 1)).await;
        assert_eq!(bus.subscribers.lock().len(), 0);
    }
}
