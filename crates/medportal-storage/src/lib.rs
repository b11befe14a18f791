//! # medportal-storage
//!
//! Storage abstraction layer for the MedPortal server.
//!
//! This crate defines the traits and types that every document store backend
//! implements. Backends live in separate crates (`medportal-db-memory`,
//! `medportal-db-postgres`).
//!
//! ## Overview
//!
//! [`DocumentStore`] is an untyped JSON document store: one collection per
//! entity, query by field conditions, and a cascade delete that removes a
//! document and pulls its id out of an array field in another collection.
//!
//! [`Collection`] wraps a store with a typed view over one entity:
//!
//! ```ignore
//! use medportal_core::Blog;
//! use medportal_storage::{Collection, Filter};
//!
//! async fn titles(blogs: &Collection<Blog>) -> Result<Vec<String>, StorageError> {
//!     let found = blogs.find(&Filter::all()).await?;
//!     Ok(found.into_iter().map(|b| b.data.title).collect())
//! }
//! ```

mod error;
mod repository;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use repository::{Collection, Stored};
pub use traits::DocumentStore;
pub use types::{ArrayPull, CascadeOutcome, Condition, Filter, ID_FIELD, StoredDocument};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use medportal_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::repository::{Collection, Stored};
    pub use crate::traits::DocumentStore;
    pub use crate::types::{ArrayPull, CascadeOutcome, Condition, Filter, StoredDocument};
    pub use crate::{DynStore, StorageResult};
}
