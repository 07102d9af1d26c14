//! Socialgraph - mirrored friend graph
//!
//! Friendships are stored as two directed edges with a per-user edge
//! counter. Blocks, removals and external contact imports keep both the
//! mirror and the counters consistent inside a single transaction, and
//! notifications go out only after commit.

pub mod config;
pub mod graph;
pub mod handlers;
pub mod notification;
pub mod relationships;
pub mod social;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;
