//! External contact import.
//!
//! Matches a caller's social network contacts against registered users and
//! connects every match that has no relationship with the caller yet.

use std::sync::Arc;

use sqlx::SqliteConnection;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{finish, Result};
use crate::graph::{now_ms, Actor};
use crate::notification::{self, Notification, NotificationConfig, NotificationDispatcher};
use crate::social::SocialClient;
use crate::storage::SqliteEdgeStore;

/// Result of an import merge.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    /// Peers connected by this merge.
    pub connected: Vec<Uuid>,
    pub notifications: Vec<Notification>,
    pub dispatch: Option<JoinHandle<()>>,
}

/// Merges a social network contact list into the relationship graph.
pub struct ExternalImportMerger {
    store: SqliteEdgeStore,
    social: Arc<dyn SocialClient>,
    dispatcher: NotificationDispatcher,
    expiry_ms: i64,
}

impl ExternalImportMerger {
    pub fn new(
        store: SqliteEdgeStore,
        social: Arc<dyn SocialClient>,
        dispatcher: NotificationDispatcher,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            store,
            social,
            dispatcher,
            expiry_ms: config.expiry_ms,
        }
    }

    /// Connect the caller to every registered contact they are not related to.
    ///
    /// Contacts already related in any direction or state are skipped, so a
    /// block is never overwritten. Edges and counters for the whole batch
    /// commit together; notifications are dispatched after commit.
    pub async fn merge(
        &self,
        actor: &Actor,
        external_id: &str,
        access_token: &str,
    ) -> Result<ImportOutcome> {
        let contacts = self.social.get_friends(access_token).await?;
        if contacts.is_empty() {
            debug!(user_id = %actor.id, "No external contacts to import");
            return Ok(ImportOutcome::default());
        }

        let external_ids: Vec<String> = contacts.into_iter().map(|c| c.id).collect();
        let now = now_ms();

        let mut tx = self.store.begin().await?;
        let result = self.connect_new(&mut tx, actor.id, &external_ids, now).await;
        let connected = finish(tx, result).await?;

        if connected.is_empty() {
            debug!(
                user_id = %actor.id,
                contacts = external_ids.len(),
                "No new friends from external contacts"
            );
            return Ok(ImportOutcome::default());
        }

        info!(
            user_id = %actor.id,
            contacts = external_ids.len(),
            connected = connected.len(),
            "Imported friends from external contacts"
        );

        let notifications =
            match notification::friend_joined(actor, external_id, &connected, now, self.expiry_ms) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "Failed to build friend joined notifications");
                    Vec::new()
                }
            };
        let dispatch = self.dispatcher.dispatch(notifications.clone());

        Ok(ImportOutcome {
            connected,
            notifications,
            dispatch,
        })
    }

    async fn connect_new(
        &self,
        conn: &mut SqliteConnection,
        user: Uuid,
        external_ids: &[String],
        now: i64,
    ) -> Result<Vec<Uuid>> {
        let matched: Vec<Uuid> = self
            .store
            .lookup_users_by_external_ids(conn, external_ids)
            .await?
            .into_iter()
            .filter(|id| *id != user)
            .collect();
        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let related = self.store.related_peers(conn, user, &matched).await?;
        let peers: Vec<Uuid> = matched
            .into_iter()
            .filter(|id| !related.contains(id))
            .collect();
        if peers.is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .insert_mirrored_edges(conn, user, &peers, now)
            .await?;
        self.store.increment_counts(conn, &peers, 1, now).await?;
        self.store
            .increment_counts(conn, &[user], peers.len() as i64, now)
            .await?;

        Ok(peers)
    }
}
