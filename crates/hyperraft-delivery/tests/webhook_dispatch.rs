use hyperraft_clock::{Clock, SimClock};
use hyperraft_delivery::{DeliveryMetrics, DeliveryWorker, SecretLookup};
use hyperraft_storage::memory::MemoryDeliveryStore;
use hyperraft_storage::DeliveryStore;
use hyperraft_types::{Delivery, DeliveryStatus};
use prometheus::Registry;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

async fn enqueue_delivery(
    store: &MemoryDeliveryStore,
    endpoint: &str,
    max_attempts: u32,
) -> Delivery {
    let delivery = Delivery::new(
        "d-1".into(),
        "wh-1".into(),
        "evt-1".into(),
        endpoint.to_string(),
        "POST".into(),
        b"{\"hello\":\"world\"}".to_vec(),
        max_attempts,
        0,
    );
    store.enqueue(delivery.clone()).await.unwrap();
    delivery
}

struct FlakyOnceResponder {
    calls: AtomicU32,
}

impl Respond for FlakyOnceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200)
        }
    }
}

/// Scenario D — webhook 500 then 200. Delivery receives 500 on attempt 1,
/// 200 on attempt 2. Expected: retry delay in [1.8s, 2.2s], final attempt=2,
/// status Delivered.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_d_retries_once_then_delivers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(FlakyOnceResponder {
            calls: AtomicU32::new(0),
        })
        .mount(&server)
        .await;

    let store = Arc::new(MemoryDeliveryStore::new(1));
    let endpoint = format!("{}/hook", server.uri());
    enqueue_delivery(&store, &endpoint, 5).await;

    let clock = Arc::new(SimClock::new(Duration::from_millis(150), 7));
    let mut secrets = SecretLookup::new();
    secrets.insert("wh-1".to_string(), "top-secret".to_string());
    let metrics = Arc::new(DeliveryMetrics::new(&Registry::new()));
    let worker = DeliveryWorker::new(store.clone(), clock.clone(), secrets, metrics);

    // Attempt 1: 500, requeued with a jittered ~2s delay.
    worker.process_once(0).await;
    assert_eq!(store.depth(0).await.unwrap(), 1, "requeued, waiting out its backoff");
    assert!(matches!(
        store.claim(0, 1, clock.now_millis()).await.unwrap(),
        hyperraft_storage::ClaimOutcome::Empty
    ));

    clock.advance(Duration::from_secs(3));

    // Attempt 2: 200, delivered.
    worker.process_once(0).await;
    let dlq = store.list_dead_lettered(0).await.unwrap();
    assert!(dlq.is_empty());
}

/// Scenario E — webhook dead-letter. maxAttempts=3, 500 on every attempt.
/// Expected: after the third failure, record lands in the DLQ with
/// `lastError` populated and no further attempt is made.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_e_dead_letters_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryDeliveryStore::new(1));
    let endpoint = format!("{}/hook", server.uri());
    enqueue_delivery(&store, &endpoint, 3).await;

    let clock = Arc::new(SimClock::new(Duration::from_millis(150), 11));
    let mut secrets = SecretLookup::new();
    secrets.insert("wh-1".to_string(), "top-secret".to_string());
    let metrics = Arc::new(DeliveryMetrics::new(&Registry::new()));
    let worker = DeliveryWorker::new(store.clone(), clock.clone(), secrets, metrics);

    for _ in 0..3 {
        worker.process_once(0).await;
        clock.advance(Duration::from_secs(310));
    }

    let dlq = store.list_dead_lettered(0).await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].attempt, 3);
    assert_eq!(dlq[0].status, DeliveryStatus::DeadLettered);
    assert!(dlq[0].last_error.is_some());

    // No attempt 4: the partition is empty, nothing left to claim.
    assert_eq!(store.depth(0).await.unwrap(), 0);
}
