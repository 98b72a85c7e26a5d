//! In-memory document store for tests and local prototyping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{Body, Document, DocumentStore, Filter};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    unique_fields: HashMap<String, Vec<String>>,
    offline: bool,
}

impl Inner {
    fn check_unique(&self, collection: &str, id: &str, body: &Body) -> Result<(), StoreError> {
        let Some(fields) = self.unique_fields.get(collection) else {
            return Ok(());
        };
        let documents = self.collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);

        for field in fields {
            let value = match body.get(field) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            let taken = documents
                .iter()
                .any(|doc| doc.id != id && doc.body.get(field) == Some(value));
            if taken {
                return Err(StoreError::Conflict(format!("{collection}.{field} = {value}")));
            }
        }
        Ok(())
    }
}

/// Ordered in-memory collections with optional unique fields.
///
/// Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would give two documents in `collection` the same
    /// non-null value for `field`.
    pub fn with_unique_field(self, collection: &str, field: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .unique_fields
                .entry(collection.to_string())
                .or_default()
                .push(field.to_string());
        }
        self
    }

    /// Simulate an outage: every operation fails while unavailable.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offline = !available;
        }
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.collections.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if inner.offline {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(inner)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, body: Body) -> Result<String, StoreError> {
        let mut inner = self.lock()?;
        let id = Uuid::new_v4().to_string();
        inner.check_unique(collection, &id, &body)?;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                body,
            });
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock()?;
        let Some(documents) = inner.collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(documents
            .iter()
            .filter(|doc| filters.iter().all(|filter| filter.matches(&doc.body)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn update(&self, collection: &str, id: &str, fields: Body) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let current = inner
            .collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;

        let mut merged = current.body.clone();
        merged.extend(fields);
        inner.check_unique(collection, id, &merged)?;

        if let Some(doc) = inner
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|doc| doc.id == id))
        {
            doc.body = merged;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn body(value: Value) -> Body {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_insert_query_get_update() {
        let store = InMemoryStore::new();
        let first = store
            .insert("sessions", body(json!({ "userId": "u1", "score": 0 })))
            .await
            .unwrap();
        store
            .insert("sessions", body(json!({ "userId": "u2", "score": 0 })))
            .await
            .unwrap();
        store
            .insert("sessions", body(json!({ "userId": "u1", "score": 10 })))
            .await
            .unwrap();

        let found = store
            .query("sessions", &[Filter::eq("userId", "u1")], None)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first);

        let limited = store
            .query("sessions", &[Filter::eq("userId", "u1")], Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        store
            .update("sessions", &first, body(json!({ "score": 80 })))
            .await
            .unwrap();
        let doc = store.get("sessions", &first).await.unwrap().unwrap();
        assert_eq!(doc.body["score"], 80);
        assert_eq!(doc.body["userId"], "u1");

        assert!(store.get("sessions", "missing").await.unwrap().is_none());
        assert!(store.get("other", &first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_null_filter_needs_explicit_null() {
        let store = InMemoryStore::new();
        let explicit = store
            .insert("sessions", body(json!({ "userId": "u1", "endTime": null })))
            .await
            .unwrap();
        store
            .insert("sessions", body(json!({ "userId": "u1" })))
            .await
            .unwrap();

        let found = store
            .query("sessions", &[Filter::eq("endTime", Value::Null)], None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, explicit);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = InMemoryStore::new();
        let err = store
            .update("sessions", "nope", body(json!({ "score": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unique_field_ignores_null() {
        let store = InMemoryStore::new().with_unique_field("sessions", "activeKey");
        let id = store
            .insert("sessions", body(json!({ "activeKey": "k" })))
            .await
            .unwrap();

        let err = store
            .insert("sessions", body(json!({ "activeKey": "k" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store
            .update("sessions", &id, body(json!({ "activeKey": null })))
            .await
            .unwrap();
        store
            .insert("sessions", body(json!({ "activeKey": "k" })))
            .await
            .unwrap();
        store
            .insert("sessions", body(json!({ "activeKey": null })))
            .await
            .unwrap();
        assert_eq!(store.len("sessions"), 3);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_operation() {
        let store = InMemoryStore::new();
        let id = store.insert("sessions", Body::new()).await.unwrap();
        store.set_available(false);

        assert!(matches!(
            store.insert("sessions", Body::new()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.query("sessions", &[], None).await.is_err());
        assert!(store.get("sessions", &id).await.is_err());
        assert!(store.update("sessions", &id, Body::new()).await.is_err());

        store.set_available(true);
        assert_eq!(store.query("sessions", &[], None).await.unwrap().len(), 1);
    }

    #[test]
    fn test_clones_share_documents() {
        let store = InMemoryStore::new();
        let clone = store.clone();
        let id = tokio_test::block_on(clone.insert("sessions", body(json!({ "score": 5 }))));
        let id = tokio_test::assert_ok!(id);

        let doc = tokio_test::block_on(store.get("sessions", &id)).unwrap();
        assert_eq!(doc.map(|d| d.body["score"].clone()), Some(json!(5)));
        assert_eq!(store.len("sessions"), 1);
        assert_eq!(store.len("other"), 0);
    }
}
