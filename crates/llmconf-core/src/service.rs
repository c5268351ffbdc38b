// Config service
//
// Transport-free create/update/delete/test operations over the provider
// collection. Every successful mutation invalidates the resolution cache.

use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::cache::ConfigCache;
use crate::defaults::{
    default_model_for_provider, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
use crate::error::{ConfigError, Result};
use crate::execution::ExecutionRequest;
use crate::models::{bson_bool, bson_f64, bson_i64, collections, mask_api_key, ProviderDocument};
use crate::traits::{DocumentStore, LlmInvoker};

const TEST_PROMPT: &str = "Hi";
const TEST_MAX_TOKENS: u32 = 100;
const TEST_TIMEOUT: u32 = 30;
const PREVIEW_CHARS: usize = 100;

/// Create or update request for a provider config
#[derive(Clone)]
pub struct ConfigUpsert {
    /// Existing record id (hex); `None` creates a new record
    pub id: Option<String>,
    pub name: String,
    pub display_name: String,
    pub model: String,
    /// Blank or `None` keeps the stored key on update
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub timeout: i64,
    pub enabled: bool,
}

impl fmt::Debug for ConfigUpsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigUpsert")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ConfigUpsert {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            display_name: display_name.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            enabled: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("name must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::validation("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::validation("temperature must be within [0, 2]"));
        }
        if self.max_tokens < 1 {
            return Err(ConfigError::validation("max_tokens must be at least 1"));
        }
        if self.timeout < 1 {
            return Err(ConfigError::validation("timeout must be at least 1"));
        }
        Ok(())
    }

    fn trimmed_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

/// Provider config as shown to operators, API key masked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigView {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub timeout: i64,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ConfigView {
    fn from_record(record: ProviderDocument) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: record.id_string().unwrap_or_default(),
            display_name: record.display_name.clone().unwrap_or_default(),
            model: record.model.clone().unwrap_or_default(),
            api_key: record.api_key.as_deref().map(mask_api_key),
            base_url: record.base_url.clone(),
            temperature: bson_f64(record.temperature.as_ref()).unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: bson_i64(record.max_tokens.as_ref()).unwrap_or(DEFAULT_MAX_TOKENS),
            timeout: bson_i64(record.timeout.as_ref()).unwrap_or(DEFAULT_TIMEOUT),
            enabled: bson_bool(record.enabled.as_ref()).unwrap_or(true),
            created_at: timestamp_string(record.created_at.as_ref()).unwrap_or_else(|| now.clone()),
            updated_at: timestamp_string(record.updated_at.as_ref()).unwrap_or(now),
            name: record.name,
        }
    }
}

fn timestamp_string(value: Option<&Bson>) -> Option<String> {
    match value? {
        Bson::String(s) => Some(s.clone()),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().ok(),
        _ => None,
    }
}

/// Result of a connection test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionTestOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
}

impl ConnectionTestOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            response_preview: None,
        }
    }
}

/// CRUD and connection testing for provider configs
pub struct LlmConfigService {
    store: Arc<dyn DocumentStore>,
    cache: Arc<ConfigCache>,
    invoker: Option<Arc<dyn LlmInvoker>>,
}

impl LlmConfigService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<ConfigCache>) -> Self {
        Self {
            store,
            cache,
            invoker: None,
        }
    }

    /// Attach the execution capability used by `test_connection`
    pub fn with_invoker(mut self, invoker: Arc<dyn LlmInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// All provider records sorted by name
    pub async fn list(&self) -> Result<Vec<ConfigView>> {
        let documents = self.store.find(collections::LLM_PROVIDERS, doc! {}).await?;
        let mut records: Vec<ProviderDocument> = documents
            .into_iter()
            .filter_map(|d| match ProviderDocument::from_document(d) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed llm_providers record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records.into_iter().map(ConfigView::from_record).collect())
    }

    /// Create or update a provider record
    pub async fn upsert(&self, request: ConfigUpsert) -> Result<ConfigView> {
        request.validate()?;
        let now = Utc::now().to_rfc3339();
        let api_key = request.trimmed_api_key();

        let id = match &request.id {
            Some(id) => {
                let filter = id_filter(id)?;
                if self
                    .store
                    .find_one(collections::LLM_PROVIDERS, filter.clone())
                    .await?
                    .is_none()
                {
                    return Err(ConfigError::not_found(format!("config {}", id)));
                }

                let mut set = doc! {
                    "name": request.name.as_str(),
                    "display_name": request.display_name.as_str(),
                    "model": request.model.as_str(),
                    "base_url": optional_string(request.base_url.clone()),
                    "temperature": request.temperature,
                    "max_tokens": request.max_tokens,
                    "timeout": request.timeout,
                    "enabled": request.enabled,
                    "is_active": request.enabled,
                    "updated_at": now.as_str(),
                };
                if let Some(key) = api_key {
                    set.insert("api_key", key);
                }
                self.store
                    .update_one(collections::LLM_PROVIDERS, filter.clone(), set)
                    .await?;
                filter.get("_id").cloned().unwrap_or(Bson::Null)
            }
            None => {
                let document = doc! {
                    "name": request.name.as_str(),
                    "display_name": request.display_name.as_str(),
                    "model": request.model.as_str(),
                    "api_key": optional_string(api_key),
                    "base_url": optional_string(request.base_url.clone()),
                    "temperature": request.temperature,
                    "max_tokens": request.max_tokens,
                    "timeout": request.timeout,
                    "enabled": request.enabled,
                    "is_active": request.enabled,
                    "created_at": now.as_str(),
                    "updated_at": now.as_str(),
                };
                self.store
                    .insert_one(collections::LLM_PROVIDERS, document)
                    .await?
            }
        };

        self.cache.invalidate();
        tracing::info!(provider = %request.name, "LLM config saved, cache invalidated");

        let stored = self
            .store
            .find_one(collections::LLM_PROVIDERS, doc! { "_id": id })
            .await?
            .ok_or_else(|| ConfigError::not_found("config disappeared after write"))?;
        Ok(ConfigView::from_record(ProviderDocument::from_document(
            stored,
        )?))
    }

    /// Delete a provider record
    pub async fn delete(&self, id: &str) -> Result<()> {
        let deleted = self
            .store
            .delete_one(collections::LLM_PROVIDERS, id_filter(id)?)
            .await?;
        if !deleted {
            return Err(ConfigError::not_found(format!("config {}", id)));
        }
        self.cache.invalidate();
        tracing::info!(id, "LLM config deleted, cache invalidated");
        Ok(())
    }

    /// Send a short prompt through the execution capability using the stored key
    pub async fn test_connection(&self, id: &str) -> Result<ConnectionTestOutcome> {
        let Some(document) = self
            .store
            .find_one(collections::LLM_PROVIDERS, id_filter(id)?)
            .await?
        else {
            return Ok(ConnectionTestOutcome::failed("Configuration not found"));
        };
        let record = ProviderDocument::from_document(document)?;

        let Some(api_key) = record.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(ConnectionTestOutcome::failed(
                "No API key configured. Please add an API key first.",
            ));
        };
        let Some(invoker) = &self.invoker else {
            return Ok(ConnectionTestOutcome::failed(
                "No execution capability configured",
            ));
        };

        let request = ExecutionRequest {
            model: record
                .explicit_model()
                .unwrap_or_else(|| default_model_for_provider(&record.name))
                .to_string(),
            base_url: record.base_url.clone().or(record.default_base_url.clone()),
            provider: record.name,
            api_key: Some(api_key),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: TEST_MAX_TOKENS,
            timeout: TEST_TIMEOUT,
        };

        match invoker.invoke(&request, TEST_PROMPT).await {
            Ok(reply) => Ok(ConnectionTestOutcome {
                success: true,
                message: "LLM connection successful".to_string(),
                response_preview: Some(reply.content.chars().take(PREVIEW_CHARS).collect()),
            }),
            Err(e) => {
                tracing::error!(provider = %request.provider, error = %e, "LLM test failed");
                Ok(ConnectionTestOutcome::failed(e.to_string()))
            }
        }
    }
}

fn id_filter(id: &str) -> Result<Document> {
    let oid = ObjectId::parse_str(id)
        .map_err(|_| ConfigError::validation(format!("invalid config id: {}", id)))?;
    Ok(doc! { "_id": oid })
}

fn optional_string(value: Option<String>) -> Bson {
    value.map(Bson::String).unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_validation() {
        let mut request = ConfigUpsert::new("openai", "OpenAI", "gpt-4o");
        assert!(request.validate().is_ok());

        request.temperature = 2.5;
        assert!(matches!(request.validate(), Err(ConfigError::Validation(_))));

        request.temperature = 0.0;
        request.max_tokens = 0;
        assert!(request.validate().is_err());

        request.max_tokens = 1;
        request.timeout = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let mut request = ConfigUpsert::new("openai", "OpenAI", "gpt-4o");
        request.api_key = Some("   ".into());
        assert_eq!(request.trimmed_api_key(), None);
        request.api_key = Some(" sk-x ".into());
        assert_eq!(request.trimmed_api_key().as_deref(), Some("sk-x"));
    }

    #[test]
    fn test_upsert_debug_masks_key() {
        let mut request = ConfigUpsert::new("openai", "OpenAI", "gpt-4o");
        request.api_key = Some("sk-upsertsecret1".into());
        let printed = format!("{:?}", request);
        assert!(!printed.contains("upsertsecret"));
        assert!(printed.contains("sk-u...ret1"));
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!(matches!(
            id_filter("not-an-id"),
            Err(ConfigError::Validation(_))
        ));
    }
}
