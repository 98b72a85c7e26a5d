//! Document store port.
//!
//! The reconciler only needs four operations on named collections of JSON
//! documents: insert, equality query, fetch by id and partial field update.
//! No multi-document atomicity is assumed.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub use memory::InMemoryStore;
pub use postgres::PgDocumentStore;

/// JSON object body of a stored document.
pub type Body = Map<String, Value>;

/// A stored document with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Body,
}

/// Equality predicate on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `body` satisfies this predicate. The field must be present:
    /// a missing field does not match `null`.
    pub fn matches(&self, body: &Body) -> bool {
        body.get(&self.field) == Some(&self.value)
    }
}

/// Repository contract for JSON document collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a uniqueness constraint is violated.
    async fn insert(&self, collection: &str, body: Body) -> Result<String, StoreError>;

    /// Documents whose fields equal every filter, in insertion order.
    ///
    /// A filter only matches a field that is present in the body, so
    /// filtering on `null` finds explicit nulls and never absent fields.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Fetch a document by identifier.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Overwrite the named top-level fields of a document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Body) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn DocumentStore) {}
    }

    #[test]
    fn test_filter_matches() {
        let body = json!({ "userId": "u1", "level": "basico", "endTime": null });
        let body = body.as_object().unwrap();

        assert!(Filter::eq("userId", "u1").matches(body));
        assert!(!Filter::eq("userId", "u2").matches(body));
        assert!(Filter::eq("endTime", Value::Null).matches(body));
        assert!(!Filter::eq("missing", Value::Null).matches(body));
    }
}
