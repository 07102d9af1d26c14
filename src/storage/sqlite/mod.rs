//! SQLite implementations of storage interfaces.

mod edge_store;

pub use edge_store::SqliteEdgeStore;
