//! Relationship data model.
//!
//! A friendship is two directed [`Edge`] rows (A→B and B→A). A block is a
//! single directed row in state [`EdgeState::Blocked`]; the peer's row is
//! unaffected by the state itself.

use serde::Serialize;
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// State code stored in `user_edge.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    /// Mutual friend.
    Connected,
    /// Source has blocked destination.
    Blocked,
}

impl EdgeState {
    /// Stored state code.
    pub const fn code(self) -> i32 {
        match self {
            EdgeState::Connected => 0,
            EdgeState::Blocked => 3,
        }
    }

    /// Decode a stored state code. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(EdgeState::Connected),
            3 => Some(EdgeState::Blocked),
            _ => None,
        }
    }
}

/// One directed relationship row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source_id: Uuid,
    pub destination_id: Uuid,
    /// Ordering token, equal to the creation timestamp.
    pub position: i64,
    pub updated_at: i64,
    pub state: EdgeState,
}

/// Per-source aggregate counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMetadata {
    pub source_id: Uuid,
    pub count: i64,
    pub updated_at: i64,
}

/// Profile snapshot used to render a friend record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub handle: String,
    pub fullname: String,
    pub avatar_url: String,
    pub lang: String,
    pub location: String,
    pub timezone: String,
    pub metadata: Vec<u8>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_online_at: i64,
}

/// A peer as seen from the listing user, annotated with the edge state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Friend {
    pub user: User,
    pub state: EdgeState,
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub handle: String,
}

impl Actor {
    pub fn new(id: Uuid, handle: impl Into<String>) -> Self {
        Self {
            id,
            handle: handle.into(),
        }
    }
}
