//! Relationship consistency engine.
//!
//! Every mutation runs inside exactly one transaction and goes through
//! [`finish`], which commits on success and rolls back on any error. Both
//! directions of a friendship and every counter change they imply are
//! written in that same transaction, so a failure never leaves a
//! half-mirrored pair or a drifted counter behind.
//!
//! Notifications are built and dispatched only after commit.

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::graph::{now_ms, Actor, EdgeState, Friend};
use crate::notification::{self, Notification, NotificationConfig, NotificationDispatcher};
use crate::social::SocialError;
use crate::storage::{SqliteEdgeStore, StorageError};

pub mod import;

pub use import::{ExternalImportMerger, ImportOutcome};

/// Result type for relationship operations.
pub type Result<T> = std::result::Result<T, RelationshipError>;

/// Errors that can occur during relationship operations.
#[derive(Debug, thiserror::Error)]
pub enum RelationshipError {
    /// Bad input, detected before any transaction opens.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The operation needs a user or edge that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A BLOCKED edge exists between the pair.
    #[error("Relationship is blocked")]
    Blocked,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Social(#[from] SocialError),
}

impl From<sqlx::Error> for RelationshipError {
    fn from(err: sqlx::Error) -> Self {
        RelationshipError::Storage(StorageError::Database(err))
    }
}

/// Commit on success, roll back on failure.
///
/// The single exit path for every transaction opened by this module.
pub(crate) async fn finish<T>(tx: Transaction<'static, Sqlite>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(e) = tx.commit().await {
                error!(error = %e, "Could not commit transaction");
                return Err(e.into());
            }
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                error!(error = %rollback, "Could not rollback transaction");
            }
            Err(e)
        }
    }
}

/// Reject a target equal to the caller.
fn validate_target(actor: &Actor, target: Uuid, verb: &str) -> Result<()> {
    if target == actor.id {
        return Err(RelationshipError::Validation(format!("Cannot {} self", verb)));
    }
    Ok(())
}

/// Result of an add.
#[derive(Debug)]
pub struct AddOutcome {
    pub friend_id: Uuid,
    /// Both directions were created by this call.
    pub newly_connected: bool,
    /// Notifications handed to the dispatcher.
    pub notifications: Vec<Notification>,
    /// Delivery task, if anything was dispatched.
    pub dispatch: Option<JoinHandle<()>>,
}

/// Add, remove, block and list operations over the edge store.
#[derive(Clone)]
pub struct RelationshipPipeline {
    store: SqliteEdgeStore,
    dispatcher: NotificationDispatcher,
    expiry_ms: i64,
}

impl RelationshipPipeline {
    pub fn new(
        store: SqliteEdgeStore,
        dispatcher: NotificationDispatcher,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            expiry_ms: config.expiry_ms,
        }
    }

    /// Connect the caller and `target` as mutual friends.
    pub async fn add_by_id(&self, actor: &Actor, target: Uuid) -> Result<AddOutcome> {
        validate_target(actor, target, "add")?;

        let now = now_ms();
        let mut tx = self.store.begin().await?;
        let result = self.connect(&mut tx, actor, target, now).await;
        let newly_connected = finish(tx, result).await?;

        Ok(self.after_connect(actor, target, newly_connected, now))
    }

    /// Connect the caller and the user owning `handle` as mutual friends.
    pub async fn add_by_handle(&self, actor: &Actor, handle: &str) -> Result<AddOutcome> {
        if handle.is_empty() || handle == actor.handle {
            return Err(RelationshipError::Validation(
                "User handle must be present and not equal to user's handle".to_string(),
            ));
        }

        let now = now_ms();
        let mut tx = self.store.begin().await?;
        let result = self.resolve_and_connect(&mut tx, actor, handle, now).await;
        let (target, newly_connected) = finish(tx, result).await?;

        Ok(self.after_connect(actor, target, newly_connected, now))
    }

    async fn resolve_and_connect(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        handle: &str,
        now: i64,
    ) -> Result<(Uuid, bool)> {
        let target = self
            .store
            .find_user_id_by_handle(conn, handle)
            .await?
            .ok_or_else(|| RelationshipError::NotFound(format!("user handle {}", handle)))?;
        validate_target(actor, target, "add")?;

        let newly_connected = self.connect(conn, actor, target, now).await?;
        Ok((target, newly_connected))
    }

    /// Ensure both directions exist; bump counters only for rows inserted here.
    async fn connect(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        target: Uuid,
        now: i64,
    ) -> Result<bool> {
        if !self.store.user_exists(conn, target).await? {
            return Err(RelationshipError::NotFound(format!("user {}", target)));
        }

        let outgoing = self.store.get_edge(conn, actor.id, target).await?;
        let incoming = self.store.get_edge(conn, target, actor.id).await?;
        if outgoing
            .iter()
            .chain(incoming.iter())
            .any(|edge| edge.state == EdgeState::Blocked)
        {
            return Err(RelationshipError::Blocked);
        }

        let mut inserted = Vec::with_capacity(2);
        if self
            .store
            .insert_edge_if_absent(conn, actor.id, target, now)
            .await?
        {
            inserted.push(actor.id);
        }
        if self
            .store
            .insert_edge_if_absent(conn, target, actor.id, now)
            .await?
        {
            inserted.push(target);
        }

        if !inserted.is_empty() {
            self.store.increment_counts(conn, &inserted, 1, now).await?;
        }

        Ok(inserted.len() == 2)
    }

    fn after_connect(&self, actor: &Actor, target: Uuid, newly_connected: bool, now: i64) -> AddOutcome {
        debug!(user_id = %actor.id, friend_id = %target, newly_connected, "Added friend");

        let notifications = if newly_connected {
            match notification::friend_added(actor, target, now, self.expiry_ms) {
                Ok(n) => vec![n],
                Err(e) => {
                    warn!(error = %e, "Failed to build friend add notification");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let dispatch = self.dispatcher.dispatch(notifications.clone());
        AddOutcome {
            friend_id: target,
            newly_connected,
            notifications,
            dispatch,
        }
    }

    /// Remove both directions between the caller and `target`.
    ///
    /// Each direction is independent and idempotent; a missing row is not an error.
    pub async fn remove(&self, actor: &Actor, target: Uuid) -> Result<()> {
        validate_target(actor, target, "remove")?;

        let now = now_ms();
        let mut tx = self.store.begin().await?;
        let result = self.disconnect(&mut tx, actor.id, target, now).await;
        finish(tx, result).await?;

        info!(user_id = %actor.id, friend_id = %target, "Removed friend");
        Ok(())
    }

    async fn disconnect(
        &self,
        conn: &mut SqliteConnection,
        user: Uuid,
        target: Uuid,
        now: i64,
    ) -> Result<()> {
        if self.store.delete_edge(conn, user, target).await? {
            self.store.decrement_count(conn, user, now).await?;
        }
        if self.store.delete_edge(conn, target, user).await? {
            self.store.decrement_count(conn, target, now).await?;
        }
        Ok(())
    }

    /// Block `target`.
    ///
    /// The caller's existing edge becomes BLOCKED (the caller's counter is
    /// untouched). The reciprocal edge is deleted unless the target has
    /// already blocked the caller.
    pub async fn block(&self, actor: &Actor, target: Uuid) -> Result<()> {
        validate_target(actor, target, "block")?;

        let now = now_ms();
        let mut tx = self.store.begin().await?;
        let result = self.block_in_tx(&mut tx, actor.id, target, now).await;
        finish(tx, result).await?;

        info!(user_id = %actor.id, blocked_id = %target, "User blocked");
        Ok(())
    }

    async fn block_in_tx(
        &self,
        conn: &mut SqliteConnection,
        user: Uuid,
        target: Uuid,
        now: i64,
    ) -> Result<()> {
        let transitioned = self
            .store
            .set_state(conn, user, target, EdgeState::Blocked, now)
            .await?;
        if !transitioned {
            return Err(RelationshipError::NotFound(format!(
                "no relationship with user {}",
                target
            )));
        }

        if self
            .store
            .delete_edge_unless_blocked(conn, target, user)
            .await?
        {
            self.store.decrement_count(conn, target, now).await?;
        }
        Ok(())
    }

    /// Outgoing edges of `user` with the peer's profile, in creation order.
    pub async fn list(&self, user: Uuid) -> Result<Vec<Friend>> {
        Ok(self.store.list_friends(user).await?)
    }
}
