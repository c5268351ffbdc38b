// CLI commands

pub mod migrate;
pub mod resolve;

use llmconf_core::{ConnectionOverrides, ConnectionResolver, EnvVars, Result};
use llmconf_storage::StorageBackend;

/// Store connection settings shared by every command
pub struct StoreArgs {
    pub env: EnvVars,
    pub overrides: ConnectionOverrides,
}

impl StoreArgs {
    /// Connect to the resolved document store
    pub async fn connect(&self) -> Result<StorageBackend> {
        let resolver = ConnectionResolver::with_overrides(self.env.clone(), self.overrides.clone());
        let target = resolver.resolve_connection();
        tracing::debug!(uri = %target.redacted(), "Resolved store connection");
        StorageBackend::connect(target).await
    }
}
