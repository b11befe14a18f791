//! Data types used by the storage traits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Name under which the document id is exposed, both on the wire and in
/// filter conditions.
pub const ID_FIELD: &str = "_id";

/// A document as stored in a collection.
///
/// `body` holds the entity fields only; the id and timestamps are managed by
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// The document id.
    pub id: String,
    /// The collection the document belongs to.
    pub collection: String,
    /// Entity fields as JSON.
    pub body: Value,
    /// When the document was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the document was last written.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl StoredDocument {
    /// Creates a new `StoredDocument` stamped with the current time.
    #[must_use]
    pub fn new(collection: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            collection: collection.into(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy carrying `body` and a fresh `updated_at`.
    #[must_use]
    pub fn with_body(&self, body: Value) -> Self {
        Self {
            id: self.id.clone(),
            collection: self.collection.clone(),
            body,
            created_at: self.created_at,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Looks up a top-level field; `_id` resolves to the document id.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.body.get(name).cloned()
    }
}

/// A single field condition. Field names are top-level entity fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value exactly.
    Eq { field: String, value: Value },
    /// Array field contains the value.
    ArrayContains { field: String, value: Value },
    /// Field equals one of the values.
    In { field: String, values: Vec<Value> },
    /// String field contains `needle`, ignoring case. The needle is literal
    /// text, never a pattern.
    TextContains { field: String, needle: String },
    /// String field lies in `[gte, lt)`. Used for fixed-width UTC timestamps.
    Range {
        field: String,
        gte: Option<String>,
        lt: Option<String>,
    },
}

impl Condition {
    /// The field this condition applies to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. }
            | Self::ArrayContains { field, .. }
            | Self::In { field, .. }
            | Self::TextContains { field, .. }
            | Self::Range { field, .. } => field,
        }
    }
}

/// A conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Matches all documents.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn array_contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn any_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn text_contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::TextContains {
            field: field.into(),
            needle: needle.into(),
        });
        self
    }

    #[must_use]
    pub fn range(
        mut self,
        field: impl Into<String>,
        gte: Option<String>,
        lt: Option<String>,
    ) -> Self {
        self.conditions.push(Condition::Range {
            field: field.into(),
            gte,
            lt,
        });
        self
    }

    /// The conditions, all of which must hold.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Array field to clean up when a document is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayPull {
    /// Collection whose documents reference the deleted one.
    pub collection: String,
    /// Array field holding the references.
    pub field: String,
}

impl ArrayPull {
    #[must_use]
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
        }
    }
}

/// Result of a cascade delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Nothing was deleted.
    NotFound,
    /// The document was deleted and `unlinked` referencing documents updated.
    Deleted { unlinked: u64 },
}
