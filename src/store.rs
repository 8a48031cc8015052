//! Document store seam: fetch-by-id for responses, forms, and organizations.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::FieldValue;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document store query failed: {0}")]
    Query(String),
}

/// Read access to stored documents. `Ok(None)` means the document does not exist.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_response(&self, id: &str) -> Result<Option<FieldValue>, StoreError>;
    async fn fetch_form(&self, id: &str) -> Result<Option<FieldValue>, StoreError>;
    async fn fetch_organization(&self, id: &str) -> Result<Option<FieldValue>, StoreError>;
}

/// In-memory store for embedding and tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    responses: RwLock<HashMap<String, FieldValue>>,
    forms: RwLock<HashMap<String, FieldValue>>,
    organizations: RwLock<HashMap<String, FieldValue>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_response(&self, id: &str, doc: impl Into<FieldValue>) {
        insert(&self.responses, id, doc.into());
    }

    pub fn insert_form(&self, id: &str, doc: impl Into<FieldValue>) {
        insert(&self.forms, id, doc.into());
    }

    pub fn insert_organization(&self, id: &str, doc: impl Into<FieldValue>) {
        insert(&self.organizations, id, doc.into());
    }
}

fn insert(map: &RwLock<HashMap<String, FieldValue>>, id: &str, doc: FieldValue) {
    let mut guard = match map.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.insert(id.to_string(), doc);
}

fn lookup(
    map: &RwLock<HashMap<String, FieldValue>>,
    id: &str,
) -> Result<Option<FieldValue>, StoreError> {
    let guard = map
        .read()
        .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?;
    Ok(guard.get(id).cloned())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_response(&self, id: &str) -> Result<Option<FieldValue>, StoreError> {
        lookup(&self.responses, id)
    }

    async fn fetch_form(&self, id: &str) -> Result<Option<FieldValue>, StoreError> {
        lookup(&self.forms, id)
    }

    async fn fetch_organization(&self, id: &str) -> Result<Option<FieldValue>, StoreError> {
        lookup(&self.organizations, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trips_documents() {
        let store = MemoryDocumentStore::new();
        store.insert_form("f1", FieldValue::from(json!({"title": "Intake"})));

        let form = store.fetch_form("f1").await.unwrap().unwrap();
        assert_eq!(form.get_text("title"), Some("Intake"));
        assert!(store.fetch_form("missing").await.unwrap().is_none());
        assert!(store.fetch_response("f1").await.unwrap().is_none());
    }

    #[test]
    fn store_is_object_safe() {
        fn _assert(_: &dyn DocumentStore) {}
    }
}
