//! The document store trait implemented by every backend.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::types::{ArrayPull, CascadeOutcome, Filter, StoredDocument};

/// The main storage trait that all document store backends implement.
///
/// Implementations must be thread-safe (`Send + Sync`). Every single-document
/// write is atomic; multi-document atomicity is only available through
/// [`DocumentStore::delete_and_pull`] on backends that report
/// [`DocumentStore::supports_transactions`].
///
/// # Example
///
/// ```ignore
/// use medportal_storage::{DocumentStore, StorageError, StoredDocument};
///
/// async fn get_user(store: &dyn DocumentStore, id: &str) -> Result<StoredDocument, StorageError> {
///     store
///         .find_by_id("users", id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("users", id))
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ==================== CRUD Operations ====================

    /// Inserts a new document and assigns it an id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a unique field would be duplicated.
    /// Returns `StorageError::InvalidDocument` if `body` is not a JSON object.
    async fn insert(&self, collection: &str, body: Value) -> Result<StoredDocument, StorageError>;

    /// Reads a document by id.
    ///
    /// Returns `None` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing documents.
    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError>;

    /// Returns every document matching `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StorageError>;

    /// Returns the oldest document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    /// Counts documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    /// Replaces the body of an existing document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    /// Returns `StorageError::AlreadyExists` if a unique field would be duplicated.
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<StoredDocument, StorageError>;

    /// Deletes a document. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError>;

    // ==================== Field-level writes ====================

    /// Merges `fields` into the top level of an existing document. Fields
    /// not named in `fields` keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    /// Returns `StorageError::AlreadyExists` if a unique field would be duplicated.
    async fn set_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument, StorageError>;

    /// Appends `value` to the array `field` of one document in a single write.
    /// A missing field becomes a one-element array.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    /// Returns `StorageError::InvalidDocument` if `field` holds a non-array value.
    async fn push_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<StoredDocument, StorageError>;

    // ==================== Cross-document writes ====================

    /// Removes `value` from the array `field` of every document in
    /// `collection`. Returns the number of documents modified.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues.
    async fn pull_from_array(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<u64, StorageError>;

    /// Deletes a document and pulls its id from `pull`.
    ///
    /// The default runs the two writes in sequence. If the delete succeeds and
    /// the pull fails, `StorageError::PartialWrite` is returned. Backends with
    /// transactions override this to apply both writes atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PartialWrite` when only the delete was applied.
    async fn delete_and_pull(
        &self,
        collection: &str,
        id: &str,
        pull: &ArrayPull,
    ) -> Result<CascadeOutcome, StorageError> {
        if !self.delete(collection, id).await? {
            return Ok(CascadeOutcome::NotFound);
        }
        let value = Value::String(id.to_string());
        match self
            .pull_from_array(&pull.collection, &pull.field, &value)
            .await
        {
            Ok(unlinked) => Ok(CascadeOutcome::Deleted { unlinked }),
            Err(err) => {
                tracing::error!(
                    collection,
                    id,
                    pull_collection = %pull.collection,
                    pull_field = %pull.field,
                    error = %err,
                    "Document deleted but references were not removed"
                );
                Err(StorageError::partial_write(format!(
                    "{collection}/{id} deleted; unlinking from {}.{} failed: {err}",
                    pull.collection, pull.field
                )))
            }
        }
    }

    // ==================== Schema ====================

    /// Declares `field` unique within `collection`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if existing documents already violate the constraint
    /// or for infrastructure issues.
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError>;

    // ==================== Capabilities ====================

    /// Returns `true` if [`DocumentStore::delete_and_pull`] is atomic.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Returns the name of the storage backend.
    fn backend_name(&self) -> &'static str;
}
