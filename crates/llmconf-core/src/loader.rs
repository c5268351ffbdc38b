// Config loader
//
// Tiered lookup, first non-empty tier wins (never a merge):
// 1. active `llm_providers` records
// 2. enabled entries of the active `system_configs.llm_configs` list
// 3. provider API keys from the environment
//
// Loading never fails: store errors are logged and the next tier is tried.

use mongodb::bson::doc;
use std::sync::Arc;

use crate::defaults::ENV_PROVIDERS;
use crate::env::EnvVars;
use crate::error::Result;
use crate::models::{
    collections, CanonicalLlmConfig, LegacyConfigEntry, ProviderDocument, StoredConfig,
    SystemConfigDocument,
};
use crate::traits::DocumentStore;

/// Loads canonical configs from the store with environment fallback
pub struct ConfigLoader {
    store: Arc<dyn DocumentStore>,
    env: EnvVars,
}

impl ConfigLoader {
    pub fn new(store: Arc<dyn DocumentStore>, env: EnvVars) -> Self {
        Self { store, env }
    }

    pub fn env(&self) -> &EnvVars {
        &self.env
    }

    /// Resolve the ordered config list; never fails
    pub async fn load_from_store(&self) -> Vec<CanonicalLlmConfig> {
        let configs = self.load_store_tiers().await;
        if !configs.is_empty() {
            return configs;
        }
        load_from_env(&self.env)
    }

    async fn load_store_tiers(&self) -> Vec<CanonicalLlmConfig> {
        match self.load_providers().await {
            Ok(configs) if !configs.is_empty() => return configs,
            Ok(_) => tracing::debug!("No active records in llm_providers"),
            Err(e) => tracing::warn!(error = %e, "Could not read llm_providers"),
        }

        match self.load_legacy_system_config().await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read system_configs");
                Vec::new()
            }
        }
    }

    async fn load_providers(&self) -> Result<Vec<CanonicalLlmConfig>> {
        let documents = self
            .store
            .find(collections::LLM_PROVIDERS, doc! { "is_active": true })
            .await?;

        // Looked up at most once, and only when some record names no model
        let mut settings_model: Option<Option<String>> = None;
        let mut configs = Vec::with_capacity(documents.len());

        for document in documents {
            let record = match ProviderDocument::from_document(document) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed llm_providers record");
                    continue;
                }
            };

            let fallback = if record.explicit_model().is_none() {
                if settings_model.is_none() {
                    settings_model = Some(self.system_settings_model().await);
                }
                settings_model.clone().flatten()
            } else {
                None
            };

            let config = StoredConfig::Provider {
                record,
                settings_model: fallback,
            }
            .into_canonical();
            tracing::debug!(
                provider = %config.provider,
                model = %config.model,
                "Loaded LLM config from llm_providers"
            );
            configs.push(config);
        }
        Ok(configs)
    }

    async fn active_system_config(&self) -> Result<Option<SystemConfigDocument>> {
        self.store
            .find_one(collections::SYSTEM_CONFIGS, doc! { "is_active": true })
            .await?
            .map(SystemConfigDocument::from_document)
            .transpose()
    }

    async fn system_settings_model(&self) -> Option<String> {
        match self.active_system_config().await {
            Ok(Some(system)) => system.preferred_model().map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "No system settings model available");
                None
            }
        }
    }

    async fn load_legacy_system_config(&self) -> Result<Vec<CanonicalLlmConfig>> {
        let Some(system) = self.active_system_config().await? else {
            return Ok(Vec::new());
        };

        let mut configs = Vec::new();
        for document in system.llm_configs {
            let entry = match LegacyConfigEntry::from_document(document) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed system_configs entry");
                    continue;
                }
            };
            if !entry.is_enabled() {
                continue;
            }
            let config = StoredConfig::Legacy(entry).into_canonical();
            tracing::debug!(
                provider = %config.provider,
                model = %config.model,
                "Loaded LLM config from system_configs"
            );
            configs.push(config);
        }
        Ok(configs)
    }
}

/// Configs for every provider whose API key is set to a non-placeholder value
pub fn load_from_env(env: &EnvVars) -> Vec<CanonicalLlmConfig> {
    let mut configs = Vec::new();
    for provider in ENV_PROVIDERS {
        let Some(api_key) = env.configured(provider.api_key_var) else {
            continue;
        };
        let base_url = env
            .get(&provider.base_url_var())
            .unwrap_or(provider.default_base_url);
        let model = env
            .get(&provider.model_var())
            .unwrap_or(provider.default_model);

        configs.push(
            CanonicalLlmConfig::new(provider.provider, model)
                .with_api_key(api_key)
                .with_base_url(base_url),
        );
        tracing::info!(provider = provider.provider, "Loaded LLM config from env");
    }
    configs
}
