//! In-memory document store backend for the MedPortal server.
//!
//! This crate provides an in-memory implementation of the `DocumentStore`
//! trait from `medportal-storage`, using papaya lock-free HashMap for
//! concurrent reads. Writes are serialized so unique fields stay unique.
//!
//! # Example
//!
//! ```ignore
//! use medportal_db_memory::InMemoryStore;
//! use medportal_storage::DocumentStore;
//!
//! let store = InMemoryStore::new();
//! let user = store.insert("users", serde_json::json!({"clerkUserId": "u1"})).await?;
//! ```

pub mod query;
pub mod storage;

pub use medportal_storage::{DocumentStore, StorageError, StoredDocument};
pub use storage::{InMemoryStore, StorageKey};

/// Creates a new shared in-memory store.
pub fn create_store() -> medportal_storage::DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
