use serde::{Deserialize, Serialize};

fn default_max_attempts() -> u32 {
    8
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// One subscriber endpoint. Loaded from `NodeConfig` (see `hyperraft-node`);
/// `secret` is the HMAC key used to sign every delivery's body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookConfig {
    pub webhook_id: String,
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub secret: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}
