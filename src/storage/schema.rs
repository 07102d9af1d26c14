//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Users table schema (only the columns the relationship engine reads).
#[derive(Iden)]
pub enum Users {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "handle"]
    Handle,
    #[iden = "fullname"]
    Fullname,
    #[iden = "avatar_url"]
    AvatarUrl,
    #[iden = "lang"]
    Lang,
    #[iden = "location"]
    Location,
    #[iden = "timezone"]
    Timezone,
    #[iden = "metadata"]
    Metadata,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
    #[iden = "last_online_at"]
    LastOnlineAt,
    #[iden = "facebook_id"]
    FacebookId,
}

/// Directed edge table schema.
#[derive(Iden)]
pub enum UserEdge {
    Table,
    #[iden = "source_id"]
    SourceId,
    #[iden = "destination_id"]
    DestinationId,
    #[iden = "position"]
    Position,
    #[iden = "updated_at"]
    UpdatedAt,
    #[iden = "state"]
    State,
}

/// Per-source edge counter table schema.
#[derive(Iden)]
pub enum UserEdgeMetadata {
    Table,
    #[iden = "source_id"]
    SourceId,
    #[iden = "count"]
    Count,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQL for creating the users table.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY NOT NULL,
    handle TEXT NOT NULL UNIQUE,
    fullname TEXT,
    avatar_url TEXT,
    lang TEXT,
    location TEXT,
    timezone TEXT,
    metadata BLOB,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    last_online_at INTEGER NOT NULL DEFAULT 0,
    facebook_id TEXT UNIQUE
);
"#;

/// SQL for creating the edge table.
pub const CREATE_USER_EDGE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_edge (
    source_id BLOB NOT NULL,
    destination_id BLOB NOT NULL,
    position INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    state INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (source_id, destination_id)
);

CREATE INDEX IF NOT EXISTS idx_user_edge_source_position ON user_edge(source_id, position);
"#;

/// SQL for creating the edge counter table.
pub const CREATE_USER_EDGE_METADATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_edge_metadata (
    source_id BLOB PRIMARY KEY NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
"#;
