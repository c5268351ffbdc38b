// Error types for configuration resolution and migration

use thiserror::Error;

/// Result type alias for llmconf operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while resolving, mutating or migrating LLM configs
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Store connection or query failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Referenced record is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Destination sample is missing required fields
    #[error("Schema mismatch, missing fields: {}", .0.join(", "))]
    SchemaMismatch(Vec<String>),

    /// Destination already holds records and force was not supplied
    #[error("Destination already holds {0} records")]
    AlreadyMigrated(u64),

    /// Input rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Document could not be decoded or encoded
    #[error("Document error: {0}")]
    Document(String),

    /// Execution capability failure
    #[error("Execution error: {0}")]
    Execution(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ConfigError {
    /// Create a store unavailable error
    pub fn store(msg: impl Into<String>) -> Self {
        ConfigError::StoreUnavailable(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        ConfigError::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ConfigError::Validation(msg.into())
    }

    /// Create a document error
    pub fn document(msg: impl Into<String>) -> Self {
        ConfigError::Document(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        ConfigError::Execution(msg.into())
    }

    /// Whether resolution should degrade to the next fallback tier
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, ConfigError::StoreUnavailable(_))
    }
}

impl From<mongodb::bson::de::Error> for ConfigError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        ConfigError::Document(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for ConfigError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ConfigError::Document(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_lists_fields() {
        let err = ConfigError::SchemaMismatch(vec!["provider".into(), "model_name".into()]);
        assert_eq!(
            err.to_string(),
            "Schema mismatch, missing fields: provider, model_name"
        );
    }

    #[test]
    fn test_store_unavailable_predicate() {
        assert!(ConfigError::store("timeout").is_store_unavailable());
        assert!(!ConfigError::not_found("x").is_store_unavailable());
    }
}
