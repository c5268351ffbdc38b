// Core traits for pluggable backends
//
// These traits keep resolution and migration independent of any driver:
// - DocumentStore: MongoDB in production, in-memory for tests and dev mode
// - LlmInvoker: the opaque capability that actually calls a model

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use crate::error::Result;
use crate::execution::ExecutionRequest;

// ============================================================================
// DocumentStore - Collections of documents addressed by name
// ============================================================================

/// Trait for document collections addressed by name
///
/// Filters are top-level equality documents. Results come back in the
/// store's natural (insertion) order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents matching `filter`
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>>;

    /// First document matching `filter`
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    /// Number of documents in the collection
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Insert one document, assigning an `_id` when absent; returns the id
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;

    /// Insert documents in order; zero documents is a no-op
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        let mut inserted = 0;
        for document in documents {
            self.insert_one(collection, document).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Set fields on the first matching document; returns whether one matched
    async fn update_one(&self, collection: &str, filter: Document, set: Document)
        -> Result<bool>;

    /// Delete the first matching document; returns whether one was deleted
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool>;

    /// Delete all matching documents; returns the number deleted
    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64>;
}

// ============================================================================
// LlmInvoker - Execution capability
// ============================================================================

/// Response text returned by the execution capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmReply {
    pub content: String,
}

/// Trait for the capability that sends a prompt to a configured model
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    async fn invoke(&self, request: &ExecutionRequest, prompt: &str) -> Result<LlmReply>;
}
