//! Claims Deliveries off a queue partition and dispatches them over HTTP,
//! per the retry/DLQ algorithm in `hyperraft-delivery`.

use crate::metrics::DeliveryMetrics;
use crate::signing;
use hyperraft_clock::Clock;
use hyperraft_storage::{AckOutcome, ClaimOutcome, DeliveryStore};
use hyperraft_types::Delivery;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POST_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const NON_POST_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CLAIM_SLACK: Duration = Duration::from_secs(5);
/// No ready work in this partition; back off before polling again rather
/// than busy-spinning.
const EMPTY_CLAIM_BACKOFF: Duration = Duration::from_millis(200);

fn request_timeout_for(method: &str) -> Duration {
    if method.eq_ignore_ascii_case("POST") {
        POST_REQUEST_TIMEOUT
    } else {
        NON_POST_REQUEST_TIMEOUT
    }
}

fn lease_duration() -> Duration {
    CONNECT_TIMEOUT * 2 + POST_REQUEST_TIMEOUT + CLAIM_SLACK
}

enum Classification {
    Delivered,
    Retry,
    DeadLettered,
}

fn classify(status: StatusCode) -> Classification {
    if status.is_success() {
        Classification::Delivered
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Classification::Retry
    } else {
        Classification::DeadLettered
    }
}

/// Per-webhook HMAC secret lookup, keyed by `webhook_id`.
pub type SecretLookup = HashMap<String, String>;

pub struct DeliveryWorker<D: DeliveryStore, C: Clock> {
    store: Arc<D>,
    clock: Arc<C>,
    http: reqwest::Client,
    secrets: SecretLookup,
    metrics: Arc<DeliveryMetrics>,
}

impl<D: DeliveryStore, C: Clock> DeliveryWorker<D, C> {
    pub fn new(
        store: Arc<D>,
        clock: Arc<C>,
        secrets: SecretLookup,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static timeouts");
        DeliveryWorker {
            store,
            clock,
            http,
            secrets,
            metrics,
        }
    }

    /// Runs until `shutdown` fires, repeatedly claiming and dispatching from
    /// `partition`. Each empty claim sleeps for a short backoff instead of
    /// busy-polling.
    pub async fn run(&self, partition: u32, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(partition, "delivery worker shutting down");
                    return;
                }
                _ = self.process_once(partition) => {}
            }
        }
    }

    /// Claims and dispatches a single Delivery from `partition`, or sleeps
    /// out a short backoff if none is ready. Exposed so a caller can drive
    /// the worker one step at a time instead of via `run`'s loop.
    pub async fn process_once(&self, partition: u32) {
        let now = self.clock.now_millis();
        let lease_expires = now + lease_duration().as_millis() as u64;
        let claimed = match self.store.claim(partition, lease_expires, now).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, partition, "claim failed");
                tokio::time::sleep(EMPTY_CLAIM_BACKOFF).await;
                return;
            }
        };
        let delivery = match claimed {
            ClaimOutcome::Claimed(d) => d,
            ClaimOutcome::Empty => {
                tokio::time::sleep(EMPTY_CLAIM_BACKOFF).await;
                return;
            }
        };
        self.metrics.in_flight.inc();
        self.dispatch(delivery).await;
        self.metrics.in_flight.dec();
    }

    #[instrument(skip(self, delivery), fields(delivery_id = %delivery.delivery_id, attempt = delivery.attempt))]
    async fn dispatch(&self, delivery: Delivery) {
        let Some(secret) = self.secrets.get(&delivery.webhook_id) else {
            warn!(webhook_id = %delivery.webhook_id, "no secret configured, dead-lettering");
            let _ = self
                .store
                .ack(
                    &delivery.delivery_id,
                    AckOutcome::DeadLettered,
                    Some("no signing secret configured for webhook".to_string()),
                    None,
                )
                .await;
            self.metrics.dead_lettered.inc();
            return;
        };

        let signature = signing::sign(secret.as_bytes(), &delivery.body);
        let timeout = request_timeout_for(&delivery.method);
        let method = reqwest::Method::from_bytes(delivery.method.as_bytes())
            .unwrap_or(reqwest::Method::POST);

        let started = Instant::now();
        self.metrics.dispatched.inc();
        let result = self
            .http
            .request(method, &delivery.endpoint)
            .timeout(timeout)
            .header("X-Webhook-ID", &delivery.webhook_id)
            .header("X-Event-ID", &delivery.event_id)
            .header("X-Delivery-ID", &delivery.delivery_id)
            .header("X-Attempt", delivery.attempt.to_string())
            .header("X-Signature", format!("sha256={signature}"))
            .body(delivery.body.clone())
            .send()
            .await;
        let latency = started.elapsed();
        self.metrics
            .dispatch_latency_seconds
            .observe(latency.as_secs_f64());

        match result {
            Ok(response) => {
                self.handle_response(&delivery, response.status(), latency)
                    .await
            }
            Err(err) => {
                info!(%err, "delivery request errored, treating as retryable");
                self.retry_or_dead_letter(&delivery, err.to_string()).await
            }
        }
    }

    async fn handle_response(
        &self,
        delivery: &Delivery,
        status: StatusCode,
        latency: Duration,
    ) {
        match classify(status) {
            Classification::Delivered => {
                let _ = self
                    .store
                    .ack(
                        &delivery.delivery_id,
                        AckOutcome::Delivered,
                        None,
                        Some(latency.as_millis() as u64),
                    )
                    .await;
                self.metrics.delivered.inc();
                info!(status = status.as_u16(), "delivered");
            }
            Classification::Retry => {
                self.retry_or_dead_letter(delivery, format!("http {status}"))
                    .await
            }
            Classification::DeadLettered => {
                let _ = self
                    .store
                    .ack(
                        &delivery.delivery_id,
                        AckOutcome::DeadLettered,
                        Some(format!("non-retryable http {status}")),
                        Some(latency.as_millis() as u64),
                    )
                    .await;
                self.metrics.dead_lettered.inc();
                warn!(status = status.as_u16(), "dead-lettered: non-retryable response");
            }
        }
    }

    async fn retry_or_dead_letter(&self, delivery: &Delivery, last_error: String) {
        if delivery.attempt >= delivery.max_attempts {
            let _ = self
                .store
                .ack(
                    &delivery.delivery_id,
                    AckOutcome::DeadLettered,
                    Some(last_error),
                    None,
                )
                .await;
            self.metrics.dead_lettered.inc();
            warn!("dead-lettered: attempts exhausted");
            return;
        }
        let delay = self.clock.retry_delay(delivery.attempt);
        let scheduled_at = self.clock.now_millis() + delay.as_millis() as u64;
        let _ = self
            .store
            .requeue(&delivery.delivery_id, scheduled_at, Some(last_error))
            .await;
        self.metrics.retried.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperraft_clock::SimClock;
    use hyperraft_storage::memory::MemoryDeliveryStore;
    use std::time::Duration as StdDuration;

    fn worker(
        secrets: SecretLookup,
    ) -> DeliveryWorker<MemoryDeliveryStore, SimClock> {
        let store = Arc::new(MemoryDeliveryStore::new(1));
        let clock = Arc::new(SimClock::new(StdDuration::from_millis(150), 9));
        let metrics = Arc::new(DeliveryMetrics::new(&prometheus::Registry::new()));
        DeliveryWorker::new(store, clock, secrets, metrics)
    }

    #[test]
    fn classify_2xx_is_delivered() {
        assert!(matches!(classify(StatusCode::OK), Classification::Delivered));
    }

    #[test]
    fn classify_429_and_5xx_are_retryable() {
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS),
            Classification::Retry
        ));
        assert!(matches!(
            classify(StatusCode::INTERNAL_SERVER_ERROR),
            Classification::Retry
        ));
    }

    #[test]
    fn classify_other_4xx_is_dead_lettered() {
        assert!(matches!(
            classify(StatusCode::NOT_FOUND),
            Classification::DeadLettered
        ));
    }

    #[tokio::test]
    async fn exhausted_retry_dead_letters_without_incrementing_attempt_in_requeue() {
        let store = Arc::new(MemoryDeliveryStore::new(1));
        let clock = Arc::new(SimClock::new(StdDuration::from_millis(150), 3));
        let metrics = Arc::new(DeliveryMetrics::new(&prometheus::Registry::new()));
        let w = DeliveryWorker::new(store.clone(), clock, SecretLookup::new(), metrics);

        let mut delivery = Delivery::new(
            "d1".into(),
            "wh1".into(),
            "evt1".into(),
            "https://example.test".into(),
            "POST".into(),
            b"{}".to_vec(),
            3,
            0,
        );
        delivery.attempt = 3;
        store.enqueue(delivery.clone()).await.unwrap();

        w.retry_or_dead_letter(&delivery, "500".into()).await;

        let dlq = store.list_dead_lettered(0).await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].attempt, 3);
    }

    #[tokio::test]
    async fn missing_secret_dead_letters_immediately() {
        let w = worker(SecretLookup::new());
        let delivery = Delivery::new(
            "d1".into(),
            "wh-no-secret".into(),
            "evt1".into(),
            "https://example.test".into(),
            "POST".into(),
            b"{}".to_vec(),
            3,
            0,
        );
        w.store.enqueue(delivery.clone()).await.unwrap();
        w.dispatch(delivery).await;
        let dlq = w.store.list_dead_lettered(0).await.unwrap();
        assert_eq!(dlq.len(), 1);
    }
}
