use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use medportal_core::generate_id;
use medportal_storage::{DocumentStore, Filter, StorageError, StoredDocument};
use papaya::HashMap as PapayaHashMap;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::query::matches_filter;

pub type StorageKey = String; // Format: "collection/id"

pub(crate) fn make_storage_key(collection: &str, id: &str) -> StorageKey {
    format!("{collection}/{id}")
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    /// Insertion sequence; gives a stable oldest-first order.
    seq: u64,
    doc: StoredDocument,
}

/// In-memory document store using papaya lock-free HashMap.
///
/// This storage implementation provides:
/// - Lock-free concurrent reads via papaya::HashMap
/// - Serialized writes, so unique-field checks cannot race
/// - Oldest-first result ordering
///
/// It does not provide multi-document transactions; `delete_and_pull` uses
/// the sequential default from the trait.
#[derive(Debug)]
pub struct InMemoryStore {
    pub(crate) data: Arc<PapayaHashMap<StorageKey, Entry>>,
    /// collection -> unique fields
    unique: RwLock<HashMap<String, Vec<String>>>,
    write_lock: Mutex<()>,
    seq: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            unique: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            seq: AtomicU64::new(1),
        }
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self, collection: &str) -> Vec<Entry> {
        let guard = self.data.pin();
        let mut entries: Vec<Entry> = guard
            .iter()
            .filter(|(_, entry)| entry.doc.collection == collection)
            .map(|(_, entry)| entry.clone())
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    /// Fails if `body` would duplicate a unique field held by another document.
    async fn check_unique(
        &self,
        collection: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), StorageError> {
        let unique = self.unique.read().await;
        let Some(fields) = unique.get(collection) else {
            return Ok(());
        };
        for field in fields {
            let Some(value) = body.get(field) else {
                continue;
            };
            let clash = self
                .entries(collection)
                .into_iter()
                .any(|e| e.doc.id != id && e.doc.body.get(field) == Some(value));
            if clash {
                return Err(StorageError::already_exists(
                    collection,
                    format!("{field}={value}"),
                ));
            }
        }
        Ok(())
    }
}

impl InMemoryStore {
    /// Loads the entry for `collection/id`. Caller holds `write_lock`.
    fn existing(&self, collection: &str, id: &str) -> Result<Entry, StorageError> {
        self.data
            .pin()
            .get(&make_storage_key(collection, id))
            .cloned()
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    /// Stores `body` over `entry`, keeping its insertion order. Caller holds
    /// `write_lock`.
    fn overwrite(&self, entry: Entry, body: Value) -> StoredDocument {
        let doc = entry.doc.with_body(body);
        self.data.pin().insert(
            make_storage_key(&doc.collection, &doc.id),
            Entry {
                seq: entry.seq,
                doc: doc.clone(),
            },
        );
        doc
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_object(body: &Value) -> Result<(), StorageError> {
    if body.is_object() {
        Ok(())
    } else {
        Err(StorageError::invalid_document("document body must be a JSON object"))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    #[instrument(skip(self, body), level = "debug")]
    async fn insert(&self, collection: &str, body: Value) -> Result<StoredDocument, StorageError> {
        ensure_object(&body)?;
        let _write = self.write_lock.lock().await;
        let id = generate_id();
        self.check_unique(collection, &id, &body).await?;

        let doc = StoredDocument::new(collection, id, body);
        let entry = Entry {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            doc: doc.clone(),
        };
        self.data
            .pin()
            .insert(make_storage_key(collection, &doc.id), entry);
        debug!(collection, id = %doc.id, "document inserted");
        Ok(doc)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        let guard = self.data.pin();
        Ok(guard
            .get(&make_storage_key(collection, id))
            .map(|entry| entry.doc.clone()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StorageError> {
        Ok(self
            .entries(collection)
            .into_iter()
            .map(|e| e.doc)
            .filter(|doc| matches_filter(filter, doc))
            .collect())
    }

    #[instrument(skip(self, body), level = "debug")]
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<StoredDocument, StorageError> {
        ensure_object(&body)?;
        let _write = self.write_lock.lock().await;
        let existing = self.existing(collection, id)?;
        self.check_unique(collection, id, &body).await?;
        Ok(self.overwrite(existing, body))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let _write = self.write_lock.lock().await;
        Ok(self
            .data
            .pin()
            .remove(&make_storage_key(collection, id))
            .is_some())
    }

    #[instrument(skip(self, fields), level = "debug")]
    async fn set_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument, StorageError> {
        let _write = self.write_lock.lock().await;
        let existing = self.existing(collection, id)?;
        let mut body = existing.doc.body.clone();
        let Some(object) = body.as_object_mut() else {
            return Err(StorageError::invalid_document("document body must be a JSON object"));
        };
        let changed: Vec<&str> = fields.keys().map(String::as_str).collect();
        debug!(collection, id, fields = ?changed, "setting fields");
        object.extend(fields);
        self.check_unique(collection, id, &body).await?;
        Ok(self.overwrite(existing, body))
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn push_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<StoredDocument, StorageError> {
        let _write = self.write_lock.lock().await;
        let existing = self.existing(collection, id)?;
        let mut body = existing.doc.body.clone();
        let Some(object) = body.as_object_mut() else {
            return Err(StorageError::invalid_document("document body must be a JSON object"));
        };
        match object
            .entry(field)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => items.push(value.clone()),
            _ => {
                return Err(StorageError::invalid_document(format!(
                    "{collection}/{id}: field {field} is not an array"
                )));
            }
        }
        Ok(self.overwrite(existing, body))
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn pull_from_array(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<u64, StorageError> {
        let _write = self.write_lock.lock().await;
        let mut modified = 0;
        for entry in self.entries(collection) {
            let Some(items) = entry.doc.body.get(field).and_then(Value::as_array) else {
                continue;
            };
            if !items.contains(value) {
                continue;
            }
            let kept: Vec<Value> = items.iter().filter(|v| *v != value).cloned().collect();
            let mut body = entry.doc.body.clone();
            body[field] = Value::Array(kept);
            self.overwrite(entry, body);
            modified += 1;
        }
        debug!(collection, field, modified, "value pulled from arrays");
        Ok(modified)
    }

    #[instrument(skip(self), level = "debug")]
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StorageError> {
        let _write = self.write_lock.lock().await;
        let mut seen = Vec::new();
        for entry in self.entries(collection) {
            if let Some(value) = entry.doc.body.get(field) {
                if seen.contains(value) {
                    return Err(StorageError::already_exists(
                        collection,
                        format!("{field}={value}"),
                    ));
                }
                seen.push(value.clone());
            }
        }
        let mut unique = self.unique.write().await;
        let fields = unique.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
