//! Request handlers.
//!
//! Translate client requests into relationship operations and write the
//! outcome back to the caller's session.

pub mod friends;

pub use friends::{
    ErrorCode, FriendTarget, FriendsAddRequest, FriendsBlockRequest, FriendsHandler,
    FriendsRemoveRequest, Response, Session,
};
