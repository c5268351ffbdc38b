// Storage backend abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// StorageBackend works with either MongoDB (production) or the in-memory
// store (dev mode). It implements DocumentStore itself so callers can wrap
// it in an Arc<dyn DocumentStore> without caring which one they got.

use async_trait::async_trait;
use llmconf_core::{ConnectionTarget, DocumentStore, InMemoryDocumentStore, Result};
use mongodb::bson::{Bson, Document};
use std::sync::Arc;

use crate::mongo::MongoDocumentStore;

/// Storage backend that can be either MongoDB or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// MongoDB database (production)
    Mongo(MongoDocumentStore),
    /// In-memory collections (dev mode)
    InMemory(Arc<InMemoryDocumentStore>),
}

impl StorageBackend {
    /// Create a MongoDB storage backend for the resolved target
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        let store = MongoDocumentStore::connect(target).await?;
        Ok(Self::Mongo(store))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDocumentStore::new()))
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    pub fn into_shared(self) -> Arc<dyn DocumentStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl DocumentStore for StorageBackend {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        match self {
            Self::Mongo(db) => db.find(collection, filter).await,
            Self::InMemory(db) => db.find(collection, filter).await,
        }
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        match self {
            Self::Mongo(db) => db.find_one(collection, filter).await,
            Self::InMemory(db) => db.find_one(collection, filter).await,
        }
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        match self {
            Self::Mongo(db) => db.count(collection).await,
            Self::InMemory(db) => db.count(collection).await,
        }
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
        match self {
            Self::Mongo(db) => db.insert_one(collection, document).await,
            Self::InMemory(db) => db.insert_one(collection, document).await,
        }
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        match self {
            Self::Mongo(db) => db.insert_many(collection, documents).await,
            Self::InMemory(db) => db.insert_many(collection, documents).await,
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
    ) -> Result<bool> {
        match self {
            Self::Mongo(db) => db.update_one(collection, filter, set).await,
            Self::InMemory(db) => db.update_one(collection, filter, set).await,
        }
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool> {
        match self {
            Self::Mongo(db) => db.delete_one(collection, filter).await,
            Self::InMemory(db) => db.delete_one(collection, filter).await,
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64> {
        match self {
            Self::Mongo(db) => db.delete_many(collection, filter).await,
            Self::InMemory(db) => db.delete_many(collection, filter).await,
        }
    }
}
