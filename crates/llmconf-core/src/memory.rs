// In-memory implementations for tests and dev mode
//
// InMemoryDocumentStore mirrors the document-store semantics the resolver and
// migrator rely on (insertion order, `_id` assignment, equality filters).
// It can be switched to "unavailable" to exercise the fallback tiers.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{ConfigError, Result};
use crate::execution::ExecutionRequest;
use crate::traits::{DocumentStore, LlmInvoker, LlmReply};

// ============================================================================
// InMemoryDocumentStore
// ============================================================================

/// Document collections kept in memory, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    unavailable: AtomicBool,
    failing: RwLock<HashSet<String>>,
    queries: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with StoreUnavailable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every subsequent operation on `collection` fail with StoreUnavailable
    pub fn fail_collection(&self, collection: &str) {
        self.failing.write().insert(collection.to_string());
    }

    /// Number of read operations served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Pre-populate a collection (useful for testing)
    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        let mut collections = self.collections.write();
        let target = collections.entry(collection.to_string()).or_default();
        for mut document in documents {
            ensure_id(&mut document);
            target.push(document);
        }
    }

    /// Snapshot of a collection in natural order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(&self, collection: &str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ConfigError::store("in-memory store marked unavailable"));
        }
        if self.failing.read().contains(collection) {
            return Err(ConfigError::store(format!(
                "in-memory collection {} marked failing",
                collection
            )));
        }
        Ok(())
    }
}

fn ensure_id(document: &mut Document) -> Bson {
    if let Some(id) = document.get("_id") {
        return id.clone();
    }
    let id = Bson::ObjectId(ObjectId::new());
    document.insert("_id", id.clone());
    id
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        self.check_available(collection)?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.check_available(collection)?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len() as u64))
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Bson> {
        self.check_available(collection)?;
        let id = ensure_id(&mut document);
        let mut collections = self.collections.write();
        let target = collections.entry(collection.to_string()).or_default();
        if target.iter().any(|d| d.get("_id") == Some(&id)) {
            return Err(ConfigError::document(format!(
                "duplicate _id {} in {}",
                id, collection
            )));
        }
        target.push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
    ) -> Result<bool> {
        self.check_available(collection)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter_mut().find(|d| matches(d, &filter)) {
            Some(document) => {
                for (key, value) in set {
                    document.insert(key, value);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool> {
        self.check_available(collection)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| matches(d, &filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64> {
        self.check_available(collection)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !matches(d, &filter));
        Ok((before - docs.len()) as u64)
    }
}

// ============================================================================
// MockLlmInvoker
// ============================================================================

/// Execution capability that returns a canned reply and records requests
#[derive(Debug, Default)]
pub struct MockLlmInvoker {
    reply: Option<String>,
    failure: Option<String>,
    calls: Mutex<Vec<(ExecutionRequest, String)>>,
}

impl MockLlmInvoker {
    /// Always answer with `reply`
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Always fail with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Requests received so far, with their prompts
    pub fn calls(&self) -> Vec<(ExecutionRequest, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmInvoker for MockLlmInvoker {
    async fn invoke(&self, request: &ExecutionRequest, prompt: &str) -> Result<LlmReply> {
        self.calls.lock().push((request.clone(), prompt.to_string()));
        if let Some(message) = &self.failure {
            return Err(ConfigError::execution(message.clone()));
        }
        Ok(LlmReply {
            content: self.reply.clone().unwrap_or_default(),
        })
    }
}
