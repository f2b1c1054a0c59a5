//! Bridges the Finality Bus to the Delivery Queue: one `Delivery` per
//! configured webhook per finalized approval.

use crate::config::WebhookConfig;
use crate::metrics::DeliveryMetrics;
use hyperraft_clock::Clock;
use hyperraft_projector::ApprovalFinalized;
use hyperraft_storage::DeliveryStore;
use hyperraft_types::Delivery;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};

#[derive(Serialize)]
struct WebhookBody<'a> {
    approval_id: &'a str,
    status: hyperraft_types::ApprovalStatus,
    finalized_index: u64,
}

/// Deterministic across restarts: re-processing the same finality event
/// against the same webhook must land on the same `Delivery::enqueue` key.
fn delivery_id(event: &ApprovalFinalized, webhook_id: &str) -> String {
    format!("{}:{}:{}", event.approval_id, event.finalized_index.0, webhook_id)
}

fn event_id(event: &ApprovalFinalized) -> String {
    format!("{}:{}", event.approval_id, event.finalized_index.0)
}

pub struct Enqueuer<D: DeliveryStore, C: Clock> {
    store: Arc<D>,
    clock: Arc<C>,
    webhooks: Vec<WebhookConfig>,
    metrics: Arc<DeliveryMetrics>,
}

impl<D: DeliveryStore, C: Clock> Enqueuer<D, C> {
    pub fn new(
        store: Arc<D>,
        clock: Arc<C>,
        webhooks: Vec<WebhookConfig>,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Enqueuer {
            store,
            clock,
            webhooks,
            metrics,
        }
    }

    /// Drains `rx` until the bus side closes it, enqueuing one `Delivery`
    /// per configured webhook for every event received.
    pub async fn run(&self, mut rx: mpsc::Receiver<ApprovalFinalized>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
    }

    #[instrument(skip(self), fields(approval_id = %event.approval_id))]
    async fn handle(&self, event: ApprovalFinalized) {
        let body = WebhookBody {
            approval_id: &event.approval_id,
            status: event.status,
            finalized_index: event.finalized_index.0,
        };
        let body_bytes = match serde_json::to_vec(&body) {
            Ok(b) => b,
            Err(err) => {
                tracing::error!(%err, "failed to encode webhook body, dropping event for all webhooks");
                return;
            }
        };

        for webhook in &self.webhooks {
            let delivery = Delivery::new(
                delivery_id(&event, &webhook.webhook_id),
                webhook.webhook_id.clone(),
                event_id(&event),
                webhook.endpoint.clone(),
                webhook.method.clone(),
                body_bytes.clone(),
                webhook.max_attempts,
                self.clock.now_millis(),
            );
            if let Err(err) = self.store.enqueue(delivery).await {
                tracing::error!(%err, webhook_id = %webhook.webhook_id, "failed to enqueue delivery");
                continue;
            }
            self.metrics.enqueued.inc();
            info!(webhook_id = %webhook.webhook_id, "enqueued delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperraft_clock::SimClock;
    use hyperraft_storage::memory::MemoryDeliveryStore;
    use hyperraft_types::{ApprovalStatus, LogIndex};
    use prometheus::Registry;
    use std::time::Duration;

    fn webhook(id: &str) -> WebhookConfig {
        WebhookConfig {
            webhook_id: id.to_string(),
            endpoint: format!("https://example.test/{id}"),
            method: "POST".to_string(),
            content_type: "application/json".to_string(),
            secret: "shh".to_string(),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn one_delivery_is_enqueued_per_configured_webhook() {
        let store = Arc::new(MemoryDeliveryStore::new(4));
        let clock = Arc::new(SimClock::new(Duration::from_millis(150), 1));
        let metrics = Arc::new(DeliveryMetrics::new(&Registry::new()));
        let enqueuer = Enqueuer::new(
            store.clone(),
            clock,
            vec![webhook("wh-a"), webhook("wh-b")],
            metrics,
        );

        enqueuer
            .handle(ApprovalFinalized {
                approval_id: "appr-1".into(),
                status: ApprovalStatus::Approved,
                finalized_index: LogIndex(7),
            })
            .await;

        let mut total = 0usize;
        for p in 0..4 {
            total += store.depth(p).await.unwrap();
        }
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn re_handling_the_same_event_is_idempotent() {
        let store = Arc::new(MemoryDeliveryStore::new(4));
        let clock = Arc::new(SimClock::new(Duration::from_millis(150), 1));
        let metrics = Arc::new(DeliveryMetrics::new(&Registry::new()));
        let enqueuer = Enqueuer::new(store.clone(), clock, vec![webhook("wh-a")], metrics);

        let event = ApprovalFinalized {
            approval_id: "appr-1".into(),
            status: ApprovalStatus::Approved,
            finalized_index: LogIndex(7),
        };
        enqueuer.handle(event.clone()).await;
        enqueuer.handle(event).await;

        let mut total = 0usize;
        for p in 0..4 {
            total += store.depth(p).await.unwrap();
        }
        assert_eq!(total, 1);
    }
}
