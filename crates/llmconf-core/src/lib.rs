// LLM Configuration Core
//
// This crate resolves which LLM provider, model and credentials an
// application should use, and migrates persisted provider configuration
// from the legacy three-collection schema to the simplified one.
//
// Key design decisions:
// - Store access goes through the DocumentStore trait; no database driver I/O here
// - Resolution is tiered (llm_providers, system_configs, environment) and never fails
// - The resolution cache is an explicit object passed by handle, invalidated by callers
// - Legacy and new-schema records are parsed through a tagged union into one canonical shape
// - Migration is four independent operations: backup, migrate, validate, rollback

pub mod accessors;
pub mod cache;
pub mod connection;
pub mod defaults;
pub mod env;
pub mod error;
pub mod execution;
pub mod loader;
pub mod migration;
pub mod models;
pub mod service;
pub mod traits;

// In-memory implementations for dev mode and testing
pub mod memory;

// Re-exports for convenience
pub use cache::{ConfigCache, ConfigList};
pub use connection::{ConnectionOverrides, ConnectionResolver, ConnectionTarget};
pub use env::EnvVars;
pub use error::{ConfigError, Result};
pub use execution::{ExecutionBaseline, ExecutionRequest, ExecutionSettings};
pub use loader::{load_from_env, ConfigLoader};
pub use memory::{InMemoryDocumentStore, MockLlmInvoker};
pub use migration::{
    BackupReport, MigrationReport, Migrator, RollbackReport, RunReport, SimplifiedLlmConfig,
    ValidationReport,
};
pub use models::{collections, CanonicalLlmConfig};
pub use service::{ConfigUpsert, ConfigView, ConnectionTestOutcome, LlmConfigService};
pub use traits::{DocumentStore, LlmInvoker, LlmReply};
