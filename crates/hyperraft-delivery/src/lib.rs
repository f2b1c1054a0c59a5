//! Finality-Bus-to-webhook delivery pipeline: durable partitioned
//! at-least-once queue plus HTTP dispatch with signing, timeout, retry and
//! dead-lettering.

mod config;
mod enqueuer;
mod error;
mod metrics;
mod signing;
mod worker;

pub use config::WebhookConfig;
pub use enqueuer::Enqueuer;
pub use error::{DeliveryError, DeliveryResult};
pub use metrics::DeliveryMetrics;
pub use worker::{DeliveryWorker, SecretLookup};
