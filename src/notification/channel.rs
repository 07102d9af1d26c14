//! In-memory queue sender.
//!
//! Enqueues batches on a bounded tokio mpsc channel for an in-process
//! delivery worker. A full or closed queue rejects the batch immediately.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Notification, NotificationError, NotificationSender, Result};

/// Sender half of the in-process notification queue.
pub struct ChannelNotificationSender {
    sender: mpsc::Sender<Vec<Notification>>,
}

impl ChannelNotificationSender {
    /// Create a queue with the given capacity (in batches).
    ///
    /// Returns the sender and the receiver the delivery worker drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<Notification>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl NotificationSender for ChannelNotificationSender {
    async fn send(&self, notifications: Vec<Notification>) -> Result<()> {
        let count = notifications.len();
        self.sender
            .try_send(notifications)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    NotificationError::Rejected("notification queue full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => NotificationError::QueueClosed,
            })?;

        debug!(count, "Enqueued notification batch");
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}
