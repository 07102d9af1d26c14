//! Mock notification sender for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Notification, NotificationError, NotificationSender, Result};

/// Records every batch it is given.
#[derive(Default)]
pub struct MockNotificationSender {
    batches: RwLock<Vec<Vec<Notification>>>,
    fail_on_send: RwLock<bool>,
}

impl MockNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_send(&self, fail: bool) {
        *self.fail_on_send.write().await = fail;
    }

    pub async fn batch_count(&self) -> usize {
        self.batches.read().await.len()
    }

    /// All notifications received so far, flattened across batches.
    pub async fn sent(&self) -> Vec<Notification> {
        self.batches.read().await.iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
    async fn send(&self, notifications: Vec<Notification>) -> Result<()> {
        if *self.fail_on_send.read().await {
            return Err(NotificationError::Rejected("Mock send failure".to_string()));
        }
        self.batches.write().await.push(notifications);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
