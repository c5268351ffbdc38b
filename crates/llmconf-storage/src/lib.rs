// Storage backends for llmconf
//
// MongoDB for production, in-memory for dev mode and tests. Both implement
// llmconf_core::DocumentStore; StorageBackend picks one at startup.

pub mod backend;
pub mod mongo;

pub use backend::StorageBackend;
pub use mongo::{MongoDocumentStore, SERVER_SELECTION_TIMEOUT};
