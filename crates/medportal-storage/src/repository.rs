//! Typed view over a single collection.

use std::collections::HashMap;
use std::marker::PhantomData;

use medportal_core::{Document, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::types::{Filter, ID_FIELD, StoredDocument};
use crate::{DynStore, StorageResult};

/// An entity together with its store-managed id and timestamps.
///
/// Serializes flat: `{"_id": ..., <entity fields>, "createdAt": ..., "updatedAt": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub data: T,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    pub updated_at: Timestamp,
}

impl<T: Document> Stored<T> {
    /// Decodes the entity held by `doc`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDocument` if the body does not match `T`.
    pub fn from_document(doc: StoredDocument) -> StorageResult<Self> {
        let data = serde_json::from_value(doc.body).map_err(|e| {
            StorageError::invalid_document(format!("{}/{}: {e}", doc.collection, doc.id))
        })?;
        Ok(Self {
            id: doc.id,
            data,
            created_at: Timestamp::new(doc.created_at),
            updated_at: Timestamp::new(doc.updated_at),
        })
    }
}

/// Typed repository for entity `T` backed by a shared [`DocumentStore`](crate::DocumentStore).
pub struct Collection<T> {
    store: DynStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Collection name.
    pub fn name(&self) -> &'static str {
        T::COLLECTION
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    pub async fn insert(&self, data: T) -> StorageResult<Stored<T>> {
        let body = serde_json::to_value(&data)?;
        let doc = self.store.insert(T::COLLECTION, body).await?;
        Ok(Stored {
            id: doc.id,
            data,
            created_at: Timestamp::new(doc.created_at),
            updated_at: Timestamp::new(doc.updated_at),
        })
    }

    pub async fn get(&self, id: &str) -> StorageResult<Option<Stored<T>>> {
        self.store
            .find_by_id(T::COLLECTION, id)
            .await?
            .map(Stored::from_document)
            .transpose()
    }

    pub async fn find(&self, filter: &Filter) -> StorageResult<Vec<Stored<T>>> {
        self.store
            .find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(Stored::from_document)
            .collect()
    }

    pub async fn find_one(&self, filter: &Filter) -> StorageResult<Option<Stored<T>>> {
        self.store
            .find_one(T::COLLECTION, filter)
            .await?
            .map(Stored::from_document)
            .transpose()
    }

    /// Loads the documents with the given ids, keyed by id. Missing ids are
    /// skipped.
    pub async fn find_by_ids<I>(&self, ids: I) -> StorageResult<HashMap<String, Stored<T>>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let found = self.find(&Filter::all().any_of(ID_FIELD, ids)).await?;
        Ok(found.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    /// Filter selecting documents owned by `identity`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Internal` if `T` has no owner field.
    pub fn owner_filter(identity: &str) -> StorageResult<Filter> {
        let field = T::OWNER_FIELD.ok_or_else(|| {
            StorageError::internal(format!("{} has no owner field", T::COLLECTION))
        })?;
        Ok(Filter::all().eq(field, identity))
    }

    pub async fn find_owned_by(&self, identity: &str) -> StorageResult<Vec<Stored<T>>> {
        self.find(&Self::owner_filter(identity)?).await
    }

    pub async fn find_one_owned_by(&self, identity: &str) -> StorageResult<Option<Stored<T>>> {
        self.find_one(&Self::owner_filter(identity)?).await
    }

    pub async fn count(&self, filter: &Filter) -> StorageResult<u64> {
        self.store.count(T::COLLECTION, filter).await
    }

    /// Writes `stored.data` back over the existing document. Writes made
    /// since `stored` was read are overwritten; use [`Collection::set_fields`]
    /// or [`Collection::push`] where other requests may edit the same document.
    pub async fn save(&self, stored: &Stored<T>) -> StorageResult<Stored<T>> {
        let body = serde_json::to_value(&stored.data)?;
        let doc = self.store.replace(T::COLLECTION, &stored.id, body).await?;
        Ok(Stored {
            id: doc.id,
            data: serde_json::from_value(doc.body)?,
            created_at: Timestamp::new(doc.created_at),
            updated_at: Timestamp::new(doc.updated_at),
        })
    }

    /// Sets the given top-level fields and leaves the rest of the document
    /// as stored.
    pub async fn set_fields(
        &self,
        id: &str,
        fields: Map<String, Value>,
    ) -> StorageResult<Stored<T>> {
        let doc = self.store.set_fields(T::COLLECTION, id, fields).await?;
        Stored::from_document(doc)
    }

    /// Appends `item` to the array `field` of document `id`.
    pub async fn push<V: Serialize + ?Sized>(
        &self,
        id: &str,
        field: &str,
        item: &V,
    ) -> StorageResult<Stored<T>> {
        let value = serde_json::to_value(item)?;
        let doc = self
            .store
            .push_to_array(T::COLLECTION, id, field, &value)
            .await?;
        Stored::from_document(doc)
    }

    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn ensure_unique(&self, field: &str) -> StorageResult<()> {
        self.store.ensure_unique(T::COLLECTION, field).await
    }
}
