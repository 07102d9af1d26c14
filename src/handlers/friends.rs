//! Friend request handler.
//!
//! Each request carries a list of targets but only the first one is acted
//! on; extra targets are logged and ignored. Validation failures are sent
//! back as `BadInput` with their message, everything else as a coarse
//! `RuntimeException` with the detail kept in the log.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::graph::{Actor, Friend};
use crate::relationships::{ExternalImportMerger, RelationshipError, RelationshipPipeline};

/// The authenticated caller and its reply channel.
pub trait Session: Send + Sync {
    fn user_id(&self) -> Uuid;
    fn handle(&self) -> &str;
    fn send(&self, response: Response);
}

/// A friend to add, by id or by handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendTarget {
    /// Raw 16-byte user id.
    UserId(Vec<u8>),
    Handle(String),
}

#[derive(Debug, Clone, Default)]
pub struct FriendsAddRequest {
    pub friends: Vec<FriendTarget>,
}

#[derive(Debug, Clone, Default)]
pub struct FriendsRemoveRequest {
    pub user_ids: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct FriendsBlockRequest {
    pub user_ids: Vec<Vec<u8>>,
}

/// Error classification sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    BadInput,
    RuntimeException,
}

/// Reply written to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Response {
    Ok,
    Friends(Vec<Friend>),
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn bad_input(message: impl Into<String>) -> Self {
        Response::Error {
            code: ErrorCode::BadInput,
            message: message.into(),
        }
    }

    pub fn runtime_exception(message: impl Into<String>) -> Self {
        Response::Error {
            code: ErrorCode::RuntimeException,
            message: message.into(),
        }
    }
}

/// First element of a request list; extra elements are ignored.
fn first<T>(items: Vec<T>, what: &str) -> Option<T> {
    if items.len() > 1 {
        warn!(count = items.len(), "Only the first {} is processed", what);
    }
    items.into_iter().next()
}

fn decode_user_id(bytes: &[u8]) -> std::result::Result<Uuid, Response> {
    if bytes.is_empty() {
        return Err(Response::bad_input("User ID must be present"));
    }
    Uuid::from_slice(bytes).map_err(|_| Response::bad_input("Invalid User ID"))
}

fn failure(err: &RelationshipError, message: &str) -> Response {
    match err {
        RelationshipError::Validation(reason) => Response::bad_input(reason.clone()),
        _ => Response::runtime_exception(message),
    }
}

/// Friend operations on behalf of a session.
pub struct FriendsHandler {
    pipeline: RelationshipPipeline,
    merger: Arc<ExternalImportMerger>,
}

impl FriendsHandler {
    pub fn new(pipeline: RelationshipPipeline, merger: Arc<ExternalImportMerger>) -> Self {
        Self { pipeline, merger }
    }

    fn actor(session: &dyn Session) -> Actor {
        Actor::new(session.user_id(), session.handle())
    }

    pub async fn add_friends(&self, session: &dyn Session, request: FriendsAddRequest) {
        let Some(target) = first(request.friends, "friend") else {
            session.send(Response::bad_input("At least one friend must be present"));
            return;
        };
        let actor = Self::actor(session);

        let result = match target {
            FriendTarget::UserId(bytes) => match decode_user_id(&bytes) {
                Ok(id) => self.pipeline.add_by_id(&actor, id).await,
                Err(response) => {
                    session.send(response);
                    return;
                }
            },
            FriendTarget::Handle(handle) => self.pipeline.add_by_handle(&actor, &handle).await,
        };

        match result {
            Ok(_) => session.send(Response::Ok),
            Err(e) => {
                error!(user_id = %actor.id, error = %e, "Failed to add friend");
                session.send(failure(&e, "Failed to add friend"));
            }
        }
    }

    pub async fn remove_friends(&self, session: &dyn Session, request: FriendsRemoveRequest) {
        let Some(bytes) = first(request.user_ids, "user ID") else {
            session.send(Response::bad_input("At least one user ID must be present"));
            return;
        };
        let target = match decode_user_id(&bytes) {
            Ok(id) => id,
            Err(response) => {
                session.send(response);
                return;
            }
        };
        let actor = Self::actor(session);

        match self.pipeline.remove(&actor, target).await {
            Ok(()) => session.send(Response::Ok),
            Err(e) => {
                error!(user_id = %actor.id, error = %e, "Failed to remove friend");
                session.send(failure(&e, "Failed to remove friend"));
            }
        }
    }

    pub async fn block_friends(&self, session: &dyn Session, request: FriendsBlockRequest) {
        let Some(bytes) = first(request.user_ids, "user ID") else {
            session.send(Response::bad_input("At least one user ID must be present"));
            return;
        };
        let target = match decode_user_id(&bytes) {
            Ok(id) => id,
            Err(response) => {
                session.send(response);
                return;
            }
        };
        let actor = Self::actor(session);

        match self.pipeline.block(&actor, target).await {
            Ok(()) => session.send(Response::Ok),
            Err(e) => {
                error!(user_id = %actor.id, error = %e, "Could not block user");
                session.send(failure(&e, "Could not block user"));
            }
        }
    }

    pub async fn list_friends(&self, session: &dyn Session) {
        match self.pipeline.list(session.user_id()).await {
            Ok(friends) => session.send(Response::Friends(friends)),
            Err(e) => {
                error!(user_id = %session.user_id(), error = %e, "Could not get friends");
                session.send(Response::runtime_exception("Could not get friends"));
            }
        }
    }

    /// Import contacts after the caller links a social account. No reply is sent.
    pub async fn import_friends(&self, session: &dyn Session, external_id: &str, access_token: &str) {
        let actor = Self::actor(session);
        if let Err(e) = self.merger.merge(&actor, external_id, access_token).await {
            error!(user_id = %actor.id, error = %e, "Could not import friends");
        }
    }
}
