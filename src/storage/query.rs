//! Parameterized statement helpers.
//!
//! Statements are built with sea-query and bound through sea-query-binder,
//! so values always travel as bind parameters. Variable-width statements
//! (`IN (...)` lookups, multi-row inserts) are split with [`chunk_size`] so
//! no single statement exceeds the store's host-parameter limit.

use sea_query::SqliteQueryBuilder;
use sea_query_binder::{SqlxBinder, SqlxValues};

/// Default host-parameter limit for SQLite builds older than 3.32.
pub const DEFAULT_MAX_BIND_PARAMS: usize = 999;

/// Render a statement as SQLite text plus its bound values.
pub fn build<S: SqlxBinder>(stmt: &S) -> (String, SqlxValues) {
    stmt.build_sqlx(SqliteQueryBuilder)
}

/// How many items fit in one statement.
///
/// `params_per_item` is the number of bind parameters each item contributes
/// and `fixed_params` the number the statement binds regardless of item count.
/// Always at least 1 so callers make progress even under a tiny limit.
pub fn chunk_size(max_bind_params: usize, params_per_item: usize, fixed_params: usize) -> usize {
    let per_item = params_per_item.max(1);
    (max_bind_params.saturating_sub(fixed_params) / per_item).max(1)
}
