// MongoDB document store
//
// Thin DocumentStore implementation over the official driver. Every driver
// error surfaces as ConfigError::StoreUnavailable; there is no retry layer,
// callers fall back instead.

use async_trait::async_trait;
use llmconf_core::{ConfigError, ConnectionTarget, DocumentStore, Result};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::time::Duration;

/// Bound on how long any operation waits for a reachable server
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

fn unavailable(context: &str, e: mongodb::error::Error) -> ConfigError {
    ConfigError::store(format!("{}: {}", context, e))
}

/// DocumentStore backed by one MongoDB database
#[derive(Clone)]
pub struct MongoDocumentStore {
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    /// Connect and ping; fails with StoreUnavailable when the server is unreachable
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        let mut options = ClientOptions::parse(target.connection_string.as_str())
            .await
            .map_err(|e| unavailable("Invalid MongoDB connection string", e))?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some("llmconf".to_string());

        let client = Client::with_options(options)
            .map_err(|e| unavailable("Failed to create MongoDB client", e))?;
        let database = client.database(&target.database_name);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| unavailable("MongoDB ping failed", e))?;

        tracing::info!(
            uri = %target.redacted(),
            database = %target.database_name,
            "Connected to MongoDB"
        );
        Ok(Self { client, database })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let mut cursor = self
            .collection(collection)
            .find(filter)
            .await
            .map_err(|e| unavailable(&format!("Failed to query '{}'", collection), e))?;

        let mut documents = Vec::new();
        while cursor
            .advance()
            .await
            .map_err(|e| unavailable(&format!("Failed to advance cursor for '{}'", collection), e))?
        {
            let document: Document = cursor
                .deserialize_current()
                .map_err(|e| unavailable(&format!("Failed to read from '{}'", collection), e))?;
            documents.push(document);
        }
        Ok(documents)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| unavailable(&format!("Failed to query '{}'", collection), e))
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.collection(collection)
            .count_documents(doc! {})
            .await
            .map_err(|e| unavailable(&format!("Failed to count '{}'", collection), e))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
        let result = self
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| unavailable(&format!("Failed to insert into '{}'", collection), e))?;
        Ok(result.inserted_id)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        // The server rejects an empty batch
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| unavailable(&format!("Failed to insert into '{}'", collection), e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
    ) -> Result<bool> {
        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$set": set })
            .await
            .map_err(|e| unavailable(&format!("Failed to update '{}'", collection), e))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(filter)
            .await
            .map_err(|e| unavailable(&format!("Failed to delete from '{}'", collection), e))?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64> {
        let result = self
            .collection(collection)
            .delete_many(filter)
            .await
            .map_err(|e| unavailable(&format!("Failed to delete from '{}'", collection), e))?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_connection_string_is_store_unavailable() {
        let target = ConnectionTarget {
            connection_string: "not-a-mongodb-uri".to_string(),
            database_name: "tradingagents".to_string(),
        };
        let err = MongoDocumentStore::connect(&target).await.err().unwrap();
        assert!(err.is_store_unavailable());
    }
}
