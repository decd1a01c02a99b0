//! Schema access used by the trial engine.
//!
//! # Submodules
//! - `fetch`: raw SQL for index snapshots, index DDL and `EXPLAIN` (no caching:
//!   every snapshot must reflect the live table)
//! - `tests`: MySQL integration tests (cfg(test) only)
//!
//! The engine talks to the database only through [`SchemaBackend`], so it can be
//! exercised against an in-memory schema in tests.

use anyhow::Result;
use sqlx::MySqlPool;
use std::future::Future;

use crate::query::explain::ExplainRow;

pub(crate) mod fetch;

/// Schema introspection, index DDL and `EXPLAIN` against one database.
pub trait SchemaBackend: Send + Sync {
    /// Index names currently present on `table` (the Table Index Snapshot).
    fn index_names(&self, table: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Create a secondary index `name` over `columns`, in order.
    fn add_index(&self, table: &str, name: &str, columns: &[String]) -> impl Future<Output = Result<()>> + Send;

    fn drop_index(&self, table: &str, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// `EXPLAIN <sql>`; `Ok(None)` when the engine returned no rows.
    fn explain(&self, sql: &str) -> impl Future<Output = Result<Option<ExplainRow>>> + Send;
}

/// [`SchemaBackend`] over a sqlx MySQL pool.
#[derive(Clone)]
pub struct MySqlSchema {
    pool: MySqlPool,
}

impl MySqlSchema {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl SchemaBackend for MySqlSchema {
    async fn index_names(&self, table: &str) -> Result<Vec<String>> {
        fetch::fetch_index_names(&self.pool, table).await
    }

    async fn add_index(&self, table: &str, name: &str, columns: &[String]) -> Result<()> {
        fetch::add_index(&self.pool, table, name, columns).await
    }

    async fn drop_index(&self, table: &str, name: &str) -> Result<()> {
        fetch::drop_index(&self.pool, table, name).await
    }

    async fn explain(&self, sql: &str) -> Result<Option<ExplainRow>> {
        fetch::fetch_explain(&self.pool, sql).await
    }
}
