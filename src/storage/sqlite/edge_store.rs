//! SQLite EdgeStore implementation.

use std::collections::HashSet;

use sea_query::{Alias, Expr, OnConflict, Order, Query, SimpleExpr};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::graph::{Edge, EdgeMetadata, EdgeState, Friend, User};
use crate::storage::query::{build, chunk_size, DEFAULT_MAX_BIND_PARAMS};
use crate::storage::schema::{
    UserEdge, UserEdgeMetadata, Users, CREATE_USERS_TABLE, CREATE_USER_EDGE_METADATA_TABLE,
    CREATE_USER_EDGE_TABLE,
};
use crate::storage::{Result, StorageError};

/// Bind parameters per edge row: source, destination, position, updated_at, state.
const EDGE_ROW_PARAMS: usize = 5;
/// Bind parameters per counter row: source, count, updated_at.
const COUNTER_ROW_PARAMS: usize = 3;

/// SQLite implementation of the edge store.
///
/// Mutations take the caller's open transaction as `&mut SqliteConnection`.
#[derive(Clone)]
pub struct SqliteEdgeStore {
    pool: SqlitePool,
    max_bind_params: usize,
}

fn id_value(id: Uuid) -> SimpleExpr {
    id.as_bytes().to_vec().into()
}

fn decode_id(bytes: &[u8]) -> Result<Uuid> {
    Ok(Uuid::from_slice(bytes)?)
}

fn decode_state(code: i64) -> Result<EdgeState> {
    EdgeState::from_code(code).ok_or(StorageError::UnknownEdgeState(code))
}

fn edge_row(source: Uuid, destination: Uuid, timestamp: i64, state: EdgeState) -> [SimpleExpr; 5] {
    [
        id_value(source),
        id_value(destination),
        timestamp.into(),
        timestamp.into(),
        state.code().into(),
    ]
}

fn edge_key(source: Uuid, destination: Uuid) -> SimpleExpr {
    Expr::col(UserEdge::SourceId)
        .eq(source.as_bytes().to_vec())
        .and(Expr::col(UserEdge::DestinationId).eq(destination.as_bytes().to_vec()))
}

impl SqliteEdgeStore {
    /// Create a new SQLite edge store.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_max_bind_params(pool, DEFAULT_MAX_BIND_PARAMS)
    }

    /// Create a store that splits batches to stay under `max_bind_params`.
    pub fn with_max_bind_params(pool: SqlitePool, max_bind_params: usize) -> Self {
        Self {
            pool,
            // A mirrored pair must always fit in one statement.
            max_bind_params: max_bind_params.max(EDGE_ROW_PARAMS * 2),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_USER_EDGE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_USER_EDGE_METADATA_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Open a transaction for a multi-statement mutation.
    ///
    /// BEGIN IMMEDIATE takes the write lock upfront. Mutations read before
    /// they write, and concurrent DEFERRED transactions racing to upgrade
    /// from shared to exclusive fail with SQLITE_BUSY.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    // --- User lookups ---

    /// Resolve external social ids to registered users.
    ///
    /// Unmatched ids are dropped; duplicates collapse to one user.
    pub async fn lookup_users_by_external_ids(
        &self,
        conn: &mut SqliteConnection,
        external_ids: &[String],
    ) -> Result<Vec<Uuid>> {
        let mut seen = HashSet::new();
        let mut users = Vec::new();

        for chunk in external_ids.chunks(chunk_size(self.max_bind_params, 1, 0)) {
            let (sql, values) = build(
                Query::select()
                    .column(Users::Id)
                    .from(Users::Table)
                    .and_where(Expr::col(Users::FacebookId).is_in(chunk.iter().cloned()))
                    .order_by(Users::Id, Order::Asc),
            );

            let rows = sqlx::query_with(&sql, values).fetch_all(&mut *conn).await?;
            for row in rows {
                let bytes: Vec<u8> = row.try_get(0)?;
                let id = decode_id(&bytes)?;
                if seen.insert(id) {
                    users.push(id);
                }
            }
        }

        Ok(users)
    }

    /// Resolve a handle to a user id.
    pub async fn find_user_id_by_handle(
        &self,
        conn: &mut SqliteConnection,
        handle: &str,
    ) -> Result<Option<Uuid>> {
        let (sql, values) = build(
            Query::select()
                .column(Users::Id)
                .from(Users::Table)
                .and_where(Expr::col(Users::Handle).eq(handle)),
        );

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let bytes: Vec<u8> = row.try_get(0)?;
                Ok(Some(decode_id(&bytes)?))
            }
            None => Ok(None),
        }
    }

    /// Check whether a user is registered.
    pub async fn user_exists(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let (sql, values) = build(
            Query::select()
                .column(Users::Id)
                .from(Users::Table)
                .and_where(Expr::col(Users::Id).eq(id.as_bytes().to_vec()))
                .limit(1),
        );

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    // --- Edge reads ---

    /// Fetch a single directed edge.
    pub async fn get_edge(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        destination: Uuid,
    ) -> Result<Option<Edge>> {
        let (sql, values) = build(
            Query::select()
                .columns([UserEdge::Position, UserEdge::UpdatedAt, UserEdge::State])
                .from(UserEdge::Table)
                .and_where(edge_key(source, destination)),
        );

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(Edge {
                source_id: source,
                destination_id: destination,
                position: row.try_get(0)?,
                updated_at: row.try_get(1)?,
                state: decode_state(row.try_get(2)?)?,
            })),
            None => Ok(None),
        }
    }

    /// Peers among `candidates` that share an edge with `user` in either
    /// direction, in any state.
    pub async fn related_peers(
        &self,
        conn: &mut SqliteConnection,
        user: Uuid,
        candidates: &[Uuid],
    ) -> Result<HashSet<Uuid>> {
        let mut related = HashSet::new();

        for chunk in candidates.chunks(chunk_size(self.max_bind_params, 1, 1)) {
            let ids: Vec<Vec<u8>> = chunk.iter().map(|id| id.as_bytes().to_vec()).collect();

            let (outgoing_sql, outgoing_values) = build(
                Query::select()
                    .column(UserEdge::DestinationId)
                    .from(UserEdge::Table)
                    .and_where(Expr::col(UserEdge::SourceId).eq(user.as_bytes().to_vec()))
                    .and_where(Expr::col(UserEdge::DestinationId).is_in(ids.clone())),
            );
            let (incoming_sql, incoming_values) = build(
                Query::select()
                    .column(UserEdge::SourceId)
                    .from(UserEdge::Table)
                    .and_where(Expr::col(UserEdge::DestinationId).eq(user.as_bytes().to_vec()))
                    .and_where(Expr::col(UserEdge::SourceId).is_in(ids)),
            );

            for (sql, values) in [(outgoing_sql, outgoing_values), (incoming_sql, incoming_values)] {
                let rows = sqlx::query_with(&sql, values).fetch_all(&mut *conn).await?;
                for row in rows {
                    let bytes: Vec<u8> = row.try_get(0)?;
                    related.insert(decode_id(&bytes)?);
                }
            }
        }

        Ok(related)
    }

    /// Counter row for a user, if one was ever written.
    pub async fn get_edge_metadata(
        &self,
        conn: &mut SqliteConnection,
        user: Uuid,
    ) -> Result<Option<EdgeMetadata>> {
        let (sql, values) = build(
            Query::select()
                .columns([UserEdgeMetadata::Count, UserEdgeMetadata::UpdatedAt])
                .from(UserEdgeMetadata::Table)
                .and_where(Expr::col(UserEdgeMetadata::SourceId).eq(user.as_bytes().to_vec())),
        );

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(EdgeMetadata {
                source_id: user,
                count: row.try_get(0)?,
                updated_at: row.try_get(1)?,
            })),
            None => Ok(None),
        }
    }

    /// Current counter value for a user; zero when no counter row exists yet.
    pub async fn edge_count(&self, conn: &mut SqliteConnection, user: Uuid) -> Result<i64> {
        Ok(self
            .get_edge_metadata(conn, user)
            .await?
            .map_or(0, |metadata| metadata.count))
    }

    // --- Edge mutations ---

    /// Insert (source, peer) and (peer, source) as CONNECTED for every peer.
    ///
    /// No existence check: a pre-existing row fails the statement with a
    /// primary key violation.
    pub async fn insert_mirrored_edges(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        peers: &[Uuid],
        timestamp: i64,
    ) -> Result<()> {
        for chunk in peers.chunks(chunk_size(self.max_bind_params, EDGE_ROW_PARAMS * 2, 0)) {
            let mut stmt = Query::insert();
            stmt.into_table(UserEdge::Table).columns([
                UserEdge::SourceId,
                UserEdge::DestinationId,
                UserEdge::Position,
                UserEdge::UpdatedAt,
                UserEdge::State,
            ]);
            for peer in chunk {
                stmt.values_panic(edge_row(source, *peer, timestamp, EdgeState::Connected));
                stmt.values_panic(edge_row(*peer, source, timestamp, EdgeState::Connected));
            }

            let (sql, values) = build(&stmt);
            sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        }

        debug!(source = %source, peers = peers.len(), "Inserted mirrored edges");
        Ok(())
    }

    /// Insert one CONNECTED directed edge unless a row already exists.
    ///
    /// Returns true if a row was inserted.
    pub async fn insert_edge_if_absent(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        destination: Uuid,
        timestamp: i64,
    ) -> Result<bool> {
        let (sql, values) = build(
            Query::insert()
                .into_table(UserEdge::Table)
                .columns([
                    UserEdge::SourceId,
                    UserEdge::DestinationId,
                    UserEdge::Position,
                    UserEdge::UpdatedAt,
                    UserEdge::State,
                ])
                .values_panic(edge_row(source, destination, timestamp, EdgeState::Connected))
                .on_conflict(
                    OnConflict::columns([UserEdge::SourceId, UserEdge::DestinationId])
                        .do_nothing()
                        .to_owned(),
                ),
        );

        let result = sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a single directed edge. Returns true if a row was removed.
    pub async fn delete_edge(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        destination: Uuid,
    ) -> Result<bool> {
        let (sql, values) = build(
            Query::delete()
                .from_table(UserEdge::Table)
                .and_where(edge_key(source, destination)),
        );

        let result = sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a directed edge only if it is not BLOCKED.
    /// Returns true if a row was removed.
    pub async fn delete_edge_unless_blocked(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        destination: Uuid,
    ) -> Result<bool> {
        let (sql, values) = build(
            Query::delete()
                .from_table(UserEdge::Table)
                .and_where(edge_key(source, destination))
                .and_where(Expr::col(UserEdge::State).ne(EdgeState::Blocked.code())),
        );

        let result = sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition an existing directed edge. Returns false if no row existed.
    pub async fn set_state(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        destination: Uuid,
        state: EdgeState,
        timestamp: i64,
    ) -> Result<bool> {
        let (sql, values) = build(
            Query::update()
                .table(UserEdge::Table)
                .value(UserEdge::State, state.code())
                .value(UserEdge::UpdatedAt, timestamp)
                .and_where(edge_key(source, destination)),
        );

        let result = sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Counters ---

    /// Add `by` to each user's counter, creating counter rows as needed.
    pub async fn increment_counts(
        &self,
        conn: &mut SqliteConnection,
        users: &[Uuid],
        by: i64,
        timestamp: i64,
    ) -> Result<()> {
        for chunk in users.chunks(chunk_size(self.max_bind_params, COUNTER_ROW_PARAMS, 0)) {
            let mut stmt = Query::insert();
            stmt.into_table(UserEdgeMetadata::Table)
                .columns([
                    UserEdgeMetadata::SourceId,
                    UserEdgeMetadata::Count,
                    UserEdgeMetadata::UpdatedAt,
                ])
                .on_conflict(
                    OnConflict::column(UserEdgeMetadata::SourceId)
                        .value(
                            UserEdgeMetadata::Count,
                            Expr::col((UserEdgeMetadata::Table, UserEdgeMetadata::Count)).add(
                                Expr::col((Alias::new("excluded"), UserEdgeMetadata::Count)),
                            ),
                        )
                        .update_column(UserEdgeMetadata::UpdatedAt)
                        .to_owned(),
                );
            for user in chunk {
                stmt.values_panic([id_value(*user), by.into(), timestamp.into()]);
            }

            let (sql, values) = build(&stmt);
            sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        }

        Ok(())
    }

    /// Subtract one from each user's counter.
    ///
    /// Callers only decrement after a delete that actually removed a row.
    pub async fn decrement_counts(
        &self,
        conn: &mut SqliteConnection,
        users: &[Uuid],
        timestamp: i64,
    ) -> Result<()> {
        for chunk in users.chunks(chunk_size(self.max_bind_params, 1, 1)) {
            let ids: Vec<Vec<u8>> = chunk.iter().map(|id| id.as_bytes().to_vec()).collect();
            let (sql, values) = build(
                Query::update()
                    .table(UserEdgeMetadata::Table)
                    .value(
                        UserEdgeMetadata::Count,
                        Expr::col(UserEdgeMetadata::Count).sub(1),
                    )
                    .value(UserEdgeMetadata::UpdatedAt, timestamp)
                    .and_where(Expr::col(UserEdgeMetadata::SourceId).is_in(ids)),
            );

            sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        }

        Ok(())
    }

    /// Decrement a single user's counter.
    pub async fn decrement_count(
        &self,
        conn: &mut SqliteConnection,
        user: Uuid,
        timestamp: i64,
    ) -> Result<()> {
        self.decrement_counts(conn, &[user], timestamp).await
    }

    // --- Listing ---

    /// All outgoing edges of `user` joined with the peer's profile, in
    /// creation order.
    ///
    /// Reads outside any transaction; the result is a best-effort snapshot.
    pub async fn list_friends(&self, user: Uuid) -> Result<Vec<Friend>> {
        let (sql, values) = build(
            Query::select()
                .columns([
                    (Users::Table, Users::Id),
                    (Users::Table, Users::Handle),
                    (Users::Table, Users::Fullname),
                    (Users::Table, Users::AvatarUrl),
                    (Users::Table, Users::Lang),
                    (Users::Table, Users::Location),
                    (Users::Table, Users::Timezone),
                    (Users::Table, Users::Metadata),
                    (Users::Table, Users::CreatedAt),
                    (Users::Table, Users::UpdatedAt),
                    (Users::Table, Users::LastOnlineAt),
                ])
                .column((UserEdge::Table, UserEdge::State))
                .from(Users::Table)
                .inner_join(
                    UserEdge::Table,
                    Expr::col((Users::Table, Users::Id))
                        .equals((UserEdge::Table, UserEdge::DestinationId)),
                )
                .and_where(
                    Expr::col((UserEdge::Table, UserEdge::SourceId)).eq(user.as_bytes().to_vec()),
                )
                .order_by((UserEdge::Table, UserEdge::Position), Order::Asc)
                .order_by((UserEdge::Table, Alias::new("rowid")), Order::Asc),
        );

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut friends = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Vec<u8> = row.try_get(0)?;
            let handle: Option<String> = row.try_get(1)?;
            let fullname: Option<String> = row.try_get(2)?;
            let avatar_url: Option<String> = row.try_get(3)?;
            let lang: Option<String> = row.try_get(4)?;
            let location: Option<String> = row.try_get(5)?;
            let timezone: Option<String> = row.try_get(6)?;
            let metadata: Option<Vec<u8>> = row.try_get(7)?;
            let created_at: Option<i64> = row.try_get(8)?;
            let updated_at: Option<i64> = row.try_get(9)?;
            let last_online_at: Option<i64> = row.try_get(10)?;
            let state: i64 = row.try_get(11)?;

            friends.push(Friend {
                user: User {
                    id: decode_id(&id)?,
                    handle: handle.unwrap_or_default(),
                    fullname: fullname.unwrap_or_default(),
                    avatar_url: avatar_url.unwrap_or_default(),
                    lang: lang.unwrap_or_default(),
                    location: location.unwrap_or_default(),
                    timezone: timezone.unwrap_or_default(),
                    metadata: metadata.unwrap_or_default(),
                    created_at: created_at.unwrap_or_default(),
                    updated_at: updated_at.unwrap_or_default(),
                    last_online_at: last_online_at.unwrap_or_default(),
                },
                state: decode_state(state)?,
            });
        }

        Ok(friends)
    }
}
