use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    InFlight,
    Delivered,
    Retry,
    DeadLettered,
}

/// A webhook dispatch unit. Owned exclusively by the delivery queue until a
/// worker holds the lease (see `hyperraft-storage`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_id: String,
    pub webhook_id: String,
    pub event_id: String,
    pub endpoint: String,
    pub method: String,
    pub body: Vec<u8>,
    pub attempt: u32,
    pub max_attempts: u32,
    /// Earliest-dispatch time, milliseconds since the Unix epoch.
    pub scheduled_at_millis: u64,
    pub status: DeliveryStatus,
    pub last_error: Option<String>,
    pub response_latency_millis: Option<u64>,
}

impl Delivery {
    pub fn new(
        delivery_id: String,
        webhook_id: String,
        event_id: String,
        endpoint: String,
        method: String,
        body: Vec<u8>,
        max_attempts: u32,
        scheduled_at_millis: u64,
    ) -> Self {
        Delivery {
            delivery_id,
            webhook_id,
            event_id,
            endpoint,
            method,
            body,
            attempt: 1,
            max_attempts,
            scheduled_at_millis,
            status: DeliveryStatus::Pending,
            last_error: None,
            response_latency_millis: None,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt > self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_delivery_starts_at_attempt_one_pending() {
        let d = Delivery::new(
            "d1".into(),
            "wh1".into(),
            "evt1".into(),
            "https://example.test/hook".into(),
            "POST".into(),
            b"{}".to_vec(),
            3,
            0,
        );
        assert_eq!(d.attempt, 1);
        assert_eq!(d.status, DeliveryStatus::Pending);
        assert!(!d.exhausted());
    }
}
