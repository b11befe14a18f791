//! PostgreSQL implementation of the `DocumentStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use medportal_storage::{
    ArrayPull, CascadeOutcome, DocumentStore, Filter, StorageError, StoredDocument,
};

use crate::config::PostgresConfig;
use crate::error::map_sqlx_error;
use crate::pool;
use crate::schema::SchemaManager;
use crate::sql::{bind_params, pull_sql, push_sql, set_fields_sql, where_clause};

type DocumentRow = (String, DateTime<Utc>, DateTime<Utc>, Value);

/// PostgreSQL document store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    schema: SchemaManager,
}

impl PostgresStore {
    /// Connects using `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let schema = SchemaManager::new(pool.clone());
        Self { pool, schema }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn table(&self, collection: &str) -> Result<(), StorageError> {
        self.schema.ensure_table(collection).await?;
        Ok(())
    }

    async fn select(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<Vec<StoredDocument>, StorageError> {
        self.table(collection).await?;
        let clause = where_clause(filter, 1)?;
        let mut sql = format!(
            r#"SELECT id, created_at, updated_at, resource FROM "{collection}"{} ORDER BY created_at, id"#,
            clause.sql
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let rows: Vec<DocumentRow> = bind_params(query_as(&sql), clause.params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        Ok(rows
            .into_iter()
            .map(|row| to_document(collection, row))
            .collect())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    #[instrument(skip(self, body))]
    async fn insert(&self, collection: &str, body: Value) -> Result<StoredDocument, StorageError> {
        if !body.is_object() {
            return Err(StorageError::invalid_document("document body must be a JSON object"));
        }
        self.table(collection).await?;
        let id = medportal_core::generate_id();
        let sql = format!(
            r#"INSERT INTO "{collection}" (id, resource) VALUES ($1, $2)
               RETURNING id, created_at, updated_at, resource"#
        );
        let row: DocumentRow = query_as(&sql)
            .bind(&id)
            .bind(&body)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        debug!(collection, id = %row.0, "document inserted");
        Ok(to_document(collection, row))
    }

    #[instrument(skip(self))]
    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        self.table(collection).await?;
        let sql = format!(
            r#"SELECT id, created_at, updated_at, resource FROM "{collection}" WHERE id = $1"#
        );
        let row: Option<DocumentRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        Ok(row.map(|row| to_document(collection, row)))
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StorageError> {
        self.select(collection, filter, None).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self
            .select(collection, filter, Some(1))
            .await?
            .into_iter()
            .next())
    }

    #[instrument(skip(self))]
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
        self.table(collection).await?;
        let clause = where_clause(filter, 1)?;
        let sql = format!(r#"SELECT COUNT(*) FROM "{collection}"{}"#, clause.sql);
        let (count,): (i64,) = bind_params(query_as(&sql), clause.params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip(self, body))]
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<StoredDocument, StorageError> {
        if !body.is_object() {
            return Err(StorageError::invalid_document("document body must be a JSON object"));
        }
        self.table(collection).await?;
        let sql = format!(
            r#"UPDATE "{collection}" SET resource = $2, updated_at = now() WHERE id = $1
               RETURNING id, created_at, updated_at, resource"#
        );
        let row: Option<DocumentRow> = query_as(&sql)
            .bind(id)
            .bind(&body)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        row.map(|row| to_document(collection, row))
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        self.table(collection).await?;
        let sql = format!(r#"DELETE FROM "{collection}" WHERE id = $1"#);
        let result = query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, fields))]
    async fn set_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument, StorageError> {
        self.table(collection).await?;
        let sql = set_fields_sql(collection)?;
        let row: Option<DocumentRow> = query_as(&sql)
            .bind(id)
            .bind(Value::Object(fields))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        row.map(|row| to_document(collection, row))
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    #[instrument(skip(self, value))]
    async fn push_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<StoredDocument, StorageError> {
        self.table(collection).await?;
        let sql = push_sql(collection, field)?;
        let row: Option<DocumentRow> = query_as(&sql)
            .bind(id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        match row {
            Some(row) => Ok(to_document(collection, row)),
            None if self.find_by_id(collection, id).await?.is_some() => Err(
                StorageError::invalid_document(format!(
                    "{collection}/{id}: field {field} is not an array"
                )),
            ),
            None => Err(StorageError::not_found(collection, id)),
        }
    }

    #[instrument(skip(self, value))]
    async fn pull_from_array(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<u64, StorageError> {
        self.table(collection).await?;
        let sql = pull_sql(collection, field)?;
        let result = query(&sql)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        Ok(result.rows_affected())
    }

    /// Runs the delete and the pull in one transaction.
    #[instrument(skip(self))]
    async fn delete_and_pull(
        &self,
        collection: &str,
        id: &str,
        pull: &ArrayPull,
    ) -> Result<CascadeOutcome, StorageError> {
        self.table(collection).await?;
        self.table(&pull.collection).await?;
        let delete_sql = format!(r#"DELETE FROM "{collection}" WHERE id = $1"#);
        let pull_sql = pull_sql(&pull.collection, &pull.field)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })?;

        let deleted = query(&delete_sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
            })?;
            return Ok(CascadeOutcome::NotFound);
        }

        let pulled = query(&pull_sql)
            .bind(Value::String(id.to_string()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&pull.collection, e))?;

        tx.commit().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
        })?;
        debug!(collection, id, unlinked = pulled.rows_affected(), "cascade delete committed");
        Ok(CascadeOutcome::Deleted {
            unlinked: pulled.rows_affected(),
        })
    }

    #[instrument(skip(self))]
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError> {
        self.table(collection).await?;
        crate::schema::validate_identifier(field)?;
        self.schema
            .ensure_unique_index(collection, field)
            .await
            .map_err(|e| map_sqlx_error(collection, e))
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn to_document(collection: &str, row: DocumentRow) -> StoredDocument {
    let (id, created_at, updated_at, body) = row;
    StoredDocument {
        id,
        collection: collection.to_string(),
        body,
        created_at: chrono_to_time(created_at),
        updated_at: chrono_to_time(updated_at),
    }
}

/// Converts chrono DateTime to time OffsetDateTime.
fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrono_to_time() {
        let dt = DateTime::<Utc>::from_timestamp(1_700_000_000, 123_000_000).unwrap();
        let converted = chrono_to_time(dt);
        assert_eq!(converted.unix_timestamp(), 1_700_000_000);
        assert_eq!(converted.millisecond(), 123);
    }

    #[test]
    fn test_row_mapping() {
        let now = Utc::now();
        let doc = to_document("blogs", ("b1".into(), now, now, serde_json::json!({"title": "T"})));
        assert_eq!(doc.id, "b1");
        assert_eq!(doc.collection, "blogs");
        assert_eq!(doc.field("title"), Some(serde_json::json!("T")));
    }
}
