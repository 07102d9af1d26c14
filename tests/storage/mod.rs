//! Shared storage integration tests.
//!
//! Tests the edge store primitives. Each database setup imports these test
//! functions and runs them.

pub mod edge_store_tests;
