//! Post-commit notification fan-out.
//!
//! Relationship changes produce [`Notification`] batches only after their
//! transaction commits. [`NotificationDispatcher`] hands each batch to a
//! [`NotificationSender`] on a separate task, so a delivery failure is logged
//! in its own failure domain and never reaches the relationship change.
//! Delivery is at most once: nothing is retried or persisted here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::graph::Actor;

pub mod channel;
pub mod http;
pub mod mock;

pub use channel::ChannelNotificationSender;
pub use http::HttpNotificationSender;
pub use mock::MockNotificationSender;

/// Subject of the notification sent when an imported contact is connected.
pub const FRIEND_JOINED_SUBJECT: &str = "Your friend has just joined the game";

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Errors that can occur while building or sending notifications.
///
/// These are warnings from the caller's point of view: the relationship
/// change that produced the batch has already committed.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification batch rejected: {0}")]
    Rejected(String),

    #[error("Notification queue closed")]
    QueueClosed,
}

/// Classification code carried by each notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i32")]
pub enum NotificationCode {
    /// A user added the recipient as a friend.
    FriendAdded,
    /// An external contact of the recipient registered and was connected.
    FriendJoinGame,
}

impl From<NotificationCode> for i32 {
    fn from(code: NotificationCode) -> Self {
        match code {
            NotificationCode::FriendAdded => 3,
            NotificationCode::FriendJoinGame => 6,
        }
    }
}

/// A notification record handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient.
    pub user_id: Uuid,
    pub sender_id: Uuid,
    pub subject: String,
    /// Opaque JSON payload.
    pub content: String,
    pub code: NotificationCode,
    pub created_at: i64,
    pub expires_at: i64,
    pub persistent: bool,
}

/// Notification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Lifetime of a notification in milliseconds.
    pub expiry_ms: i64,
    /// Capacity of the in-process delivery queue.
    pub queue_capacity: usize,
    /// Webhook delivery (optional).
    pub webhook: Option<WebhookConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            expiry_ms: 86_400_000,
            queue_capacity: 1024,
            webhook: None,
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint receiving JSON notification batches.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Delivery collaborator: accepts a non-empty batch and enqueues it.
///
/// Implementations:
/// - `ChannelNotificationSender`: bounded in-process queue
/// - `HttpNotificationSender`: JSON POST to a webhook
/// - `MockNotificationSender`: in-memory recorder for testing
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Enqueue a batch for delivery.
    async fn send(&self, notifications: Vec<Notification>) -> Result<()>;

    /// Sender name for logging.
    fn name(&self) -> &str;
}

/// Spawns best-effort delivery of committed notification batches.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }

    /// Deliver a batch on its own task.
    ///
    /// Returns `None` for an empty batch. Dropping the handle detaches the
    /// task; awaiting it only observes completion, never the send result.
    pub fn dispatch(&self, notifications: Vec<Notification>) -> Option<JoinHandle<()>> {
        if notifications.is_empty() {
            return None;
        }

        let sender = self.sender.clone();
        Some(tokio::spawn(async move {
            let count = notifications.len();
            match sender.send(notifications).await {
                Ok(()) => {
                    debug!(sender = sender.name(), count, "Dispatched notifications");
                }
                Err(e) => {
                    warn!(
                        sender = sender.name(),
                        count,
                        error = %e,
                        "Failed to send notifications"
                    );
                }
            }
        }))
    }
}

/// Notification telling `recipient` that `actor` added them.
pub fn friend_added(actor: &Actor, recipient: Uuid, now: i64, expiry_ms: i64) -> Result<Notification> {
    let content = serde_json::to_string(&serde_json::json!({ "handle": actor.handle }))?;

    Ok(Notification {
        id: Uuid::new_v4(),
        user_id: recipient,
        sender_id: actor.id,
        subject: format!("{} added you as a friend", actor.handle),
        content,
        code: NotificationCode::FriendAdded,
        created_at: now,
        expires_at: now + expiry_ms,
        persistent: true,
    })
}

/// One "friend joined" notification per newly connected peer.
pub fn friend_joined(
    actor: &Actor,
    external_id: &str,
    recipients: &[Uuid],
    now: i64,
    expiry_ms: i64,
) -> Result<Vec<Notification>> {
    let content = serde_json::to_string(&serde_json::json!({
        "handle": actor.handle,
        "facebook_id": external_id,
    }))?;

    Ok(recipients
        .iter()
        .map(|recipient| Notification {
            id: Uuid::new_v4(),
            user_id: *recipient,
            sender_id: actor.id,
            subject: FRIEND_JOINED_SUBJECT.to_string(),
            content: content.clone(),
            code: NotificationCode::FriendJoinGame,
            created_at: now,
            expires_at: now + expiry_ms,
            persistent: true,
        })
        .collect())
}
