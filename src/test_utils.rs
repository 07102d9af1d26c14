//! Test utilities.
//!
//! In-memory stores, user seeding and collaborator wiring for tests that
//! exercise the relationship engine without a database file or network.

use std::sync::Arc;

use sea_query::Query;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use crate::graph::{now_ms, Edge, EdgeState};
use crate::notification::{MockNotificationSender, NotificationConfig, NotificationDispatcher};
use crate::relationships::{ExternalImportMerger, RelationshipPipeline};
use crate::social::StaticSocialClient;
use crate::storage::query::build;
use crate::storage::schema::Users;
use crate::storage::{Result, SqliteEdgeStore};

/// Single-connection in-memory store with the schema applied.
///
/// One connection only: every pooled connection to `sqlite::memory:` would
/// otherwise see its own empty database.
pub async fn memory_store() -> Result<SqliteEdgeStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = SqliteEdgeStore::new(pool);
    store.init().await?;
    Ok(store)
}

/// Insert a registered user. The edge store never writes users itself.
pub async fn seed_user(
    store: &SqliteEdgeStore,
    handle: &str,
    facebook_id: Option<&str>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = now_ms();
    let (sql, values) = build(
        Query::insert()
            .into_table(Users::Table)
            .columns([
                Users::Id,
                Users::Handle,
                Users::Fullname,
                Users::CreatedAt,
                Users::UpdatedAt,
                Users::FacebookId,
            ])
            .values_panic([
                id.as_bytes().to_vec().into(),
                handle.into(),
                format!("{} fullname", handle).into(),
                now.into(),
                now.into(),
                facebook_id.map(str::to_string).into(),
            ]),
    );
    sqlx::query_with(&sql, values).execute(store.pool()).await?;
    Ok(id)
}

/// Write one directed edge with its counter bump, bypassing the pipeline.
///
/// Used to set up states the pipeline cannot reach on its own, such as a
/// peer's BLOCKED row without a matching row from the caller.
pub async fn seed_edge(
    store: &SqliteEdgeStore,
    source: Uuid,
    destination: Uuid,
    state: EdgeState,
) -> Result<()> {
    let now = now_ms();
    let mut tx = store.begin().await?;
    if store
        .insert_edge_if_absent(&mut tx, source, destination, now)
        .await?
    {
        store.increment_counts(&mut tx, &[source], 1, now).await?;
    }
    if state != EdgeState::Connected {
        store
            .set_state(&mut tx, source, destination, state, now)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Counter value for `user`.
pub async fn count_of(store: &SqliteEdgeStore, user: Uuid) -> Result<i64> {
    let mut conn = store.pool().acquire().await?;
    store.edge_count(&mut conn, user).await
}

/// The directed edge `source → destination`, if any.
pub async fn edge_of(store: &SqliteEdgeStore, source: Uuid, destination: Uuid) -> Result<Option<Edge>> {
    let mut conn = store.pool().acquire().await?;
    store.get_edge(&mut conn, source, destination).await
}

/// A pipeline and import merger sharing one store and one recording sender.
pub struct TestGraph {
    pub store: SqliteEdgeStore,
    pub sender: Arc<MockNotificationSender>,
    pub social: Arc<StaticSocialClient>,
    pub pipeline: RelationshipPipeline,
    pub merger: Arc<ExternalImportMerger>,
}

impl TestGraph {
    pub async fn new() -> Result<Self> {
        let store = memory_store().await?;
        Ok(Self::with_store(store))
    }

    pub fn with_store(store: SqliteEdgeStore) -> Self {
        let sender = Arc::new(MockNotificationSender::new());
        let social = Arc::new(StaticSocialClient::default());
        let dispatcher = NotificationDispatcher::new(sender.clone());
        let config = NotificationConfig::default();

        let pipeline = RelationshipPipeline::new(store.clone(), dispatcher.clone(), &config);
        let merger = Arc::new(ExternalImportMerger::new(
            store.clone(),
            social.clone(),
            dispatcher,
            &config,
        ));

        Self {
            store,
            sender,
            social,
            pipeline,
            merger,
        }
    }
}
