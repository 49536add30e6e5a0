//! Storage collaborator for node documents

pub mod matcher;

use crate::core::ids::ObjectId;
use crate::query::Filter;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised by a node store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Node not found: {0}")]
    NotFound(ObjectId),

    #[error("Unsupported operator '{operator}' on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

/// Trait for node document stores
#[async_trait::async_trait]
pub trait NodeStore: Send + Sync {
    /// Fetch a document by its identifier
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Value>, StoreError>;

    /// Fetch every document matching a translated filter
    async fn find(&self, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// Store a new document and return its assigned identifier
    async fn insert(&self, doc: Value) -> Result<ObjectId, StoreError>;

    /// Replace an existing document
    async fn update(&self, id: ObjectId, doc: Value) -> Result<(), StoreError>;
}

/// In-memory store (for testing or ephemeral use)
pub struct InMemoryNodeStore {
    documents: tokio::sync::RwLock<HashMap<ObjectId, Value>>,
    order: tokio::sync::RwLock<Vec<ObjectId>>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self {
            documents: tokio::sync::RwLock::new(HashMap::new()),
            order: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for InMemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

fn with_id(mut doc: Value, id: ObjectId) -> Result<Value, StoreError> {
    let kind = doc_kind(&doc);
    let map = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::MalformedDocument(format!("expected an object, got {}", kind)))?;
    map.remove("_id");
    map.insert("id".to_string(), Value::String(id.to_hex()));
    Ok(doc)
}

fn doc_kind(doc: &Value) -> &'static str {
    match doc {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait::async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Value>, StoreError> {
        let docs = self.documents.read().await;
        Ok(docs.get(&id).cloned())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        matcher::check_operators(filter)?;
        let docs = self.documents.read().await;
        let order = self.order.read().await;

        let mut result = Vec::new();
        for id in order.iter() {
            if let Some(doc) = docs.get(id) {
                if matcher::matches(doc, filter)? {
                    result.push(doc.clone());
                }
            }
        }
        debug!("Filter {} matched {} documents", filter, result.len());
        Ok(result)
    }

    async fn insert(&self, doc: Value) -> Result<ObjectId, StoreError> {
        let id = ObjectId::generate();
        let doc = with_id(doc, id)?;

        let mut docs = self.documents.write().await;
        docs.insert(id, doc);

        let mut order = self.order.write().await;
        order.push(id);

        debug!("Inserted document {}", id);
        Ok(id)
    }

    async fn update(&self, id: ObjectId, doc: Value) -> Result<(), StoreError> {
        let doc = with_id(doc, id)?;
        let mut docs = self.documents.write().await;
        match docs.get_mut(&id) {
            Some(existing) => {
                *existing = doc;
                debug!("Updated document {}", id);
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }
}
