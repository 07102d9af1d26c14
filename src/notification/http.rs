//! HTTP webhook sender.
//!
//! POSTs each batch as a JSON array. A failed POST is reported to the
//! dispatcher, which logs it; batches are not retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use super::{Notification, NotificationError, NotificationSender, Result, WebhookConfig};

/// Webhook notification sender.
pub struct HttpNotificationSender {
    client: Client,
    endpoint: String,
}

impl HttpNotificationSender {
    /// Create a sender for the configured endpoint.
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(NotificationError::Rejected(
                "webhook endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn send(&self, notifications: Vec<Notification>) -> Result<()> {
        let body = serde_json::to_string(&notifications)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(
                endpoint = %self.endpoint,
                count = notifications.len(),
                "Notification batch posted"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(
                endpoint = %self.endpoint,
                status = %status,
                body = %body,
                "Notification POST failed"
            );
            Err(NotificationError::Rejected(format!(
                "HTTP {} - {}",
                status,
                body.chars().take(200).collect::<String>()
            )))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
