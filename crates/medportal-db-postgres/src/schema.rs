//! Schema management for the PostgreSQL storage backend.
//!
//! One table per collection:
//!
//! ```sql
//! CREATE TABLE "<collection>" (
//!     id          TEXT PRIMARY KEY,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     resource    JSONB NOT NULL
//! )
//! ```
//!
//! Collection and field names are interpolated into SQL, so both are
//! restricted to ASCII letters, digits and underscores.

use std::sync::Arc;

use dashmap::DashSet;
use sqlx_postgres::PgPool;
use tracing::{debug, info, instrument};

use crate::error::{PostgresError, Result};

/// Creates collection tables and unique indexes on demand.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
    /// Tables known to exist.
    created_tables: Arc<DashSet<String>>,
}

impl SchemaManager {
    /// Creates a new `SchemaManager` with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            created_tables: Arc::new(DashSet::new()),
        }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensures the table for `collection` exists. Cached after the first call.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid identifier or the DDL fails.
    #[instrument(skip(self))]
    pub async fn ensure_table(&self, collection: &str) -> Result<()> {
        validate_identifier(collection)?;
        if self.created_tables.contains(collection) {
            return Ok(());
        }

        info!("Ensuring table for collection {collection}");
        let sql = create_table_sql(collection);
        sqlx_core::query::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        let index = format!(
            r#"CREATE INDEX IF NOT EXISTS "{collection}_created_idx" ON "{collection}" (created_at, id)"#
        );
        sqlx_core::query::query(&index)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        debug!("Table {collection} ready");
        self.created_tables.insert(collection.to_string());
        Ok(())
    }

    /// Creates a unique expression index on `resource->>'field'`.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if existing rows already collide.
    #[instrument(skip(self))]
    pub async fn ensure_unique_index(
        &self,
        collection: &str,
        field: &str,
    ) -> std::result::Result<(), sqlx_core::error::Error> {
        let sql = unique_index_sql(collection, field);
        sqlx_core::query::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// Accepts `[A-Za-z0-9_]+`, at most 63 bytes (PostgreSQL identifier limit).
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 {
        return Err(PostgresError::schema(format!(
            "identifier must be 1-63 characters: {name:?}"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PostgresError::schema(format!(
            "identifier contains invalid characters: {name:?}"
        )));
    }
    Ok(())
}

pub(crate) fn create_table_sql(collection: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{collection}" (
            id TEXT PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            resource JSONB NOT NULL
        )"#
    )
}

pub(crate) fn unique_index_sql(collection: &str, field: &str) -> String {
    format!(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS "{collection}_{field}_uniq" ON "{collection}" ((resource->>'{field}'))"#
    )
}
