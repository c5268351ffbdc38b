// Record types
//
// Two persisted schema generations feed the resolver. Each is parsed into its
// own raw record type and mapped into CanonicalLlmConfig by a dedicated total
// function, so callers never see schema-specific field names.

use mongodb::bson::{self, Bson, Document};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::defaults::{
    default_model_for_provider, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT,
};
use crate::error::Result;

/// Collection names shared by the resolver, the config service and the migrator
pub mod collections {
    /// Provider records (new schema for resolution, legacy input for migration)
    pub const LLM_PROVIDERS: &str = "llm_providers";
    /// Legacy model catalog, one document per provider
    pub const MODEL_CATALOGS: &str = "model_catalogs";
    /// Legacy per-model configs
    pub const LLM_CONFIGS: &str = "llm_configs";
    /// Legacy system config document with embedded `llm_configs`
    pub const SYSTEM_CONFIGS: &str = "system_configs";
    /// Flattened migration output
    pub const SIMPLIFIED_LLM_CONFIGS: &str = "simplified_llm_configs";

    /// Legacy collections snapshotted before migration
    pub const LEGACY: [&str; 3] = [LLM_PROVIDERS, LLM_CONFIGS, MODEL_CATALOGS];

    /// Backup sibling for a collection
    pub fn backup_of(collection: &str) -> String {
        format!("{}_backup", collection)
    }
}

// ============================================================================
// CanonicalLlmConfig
// ============================================================================

/// Normalized LLM provider/model setup, independent of the source schema
#[derive(Clone, PartialEq, Serialize)]
pub struct CanonicalLlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(serialize_with = "serialize_masked")]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: u32,
    pub enabled: bool,
}

impl CanonicalLlmConfig {
    /// Create an enabled config with default tuning
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into().trim().to_string(),
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS as u32,
            timeout: DEFAULT_TIMEOUT as u32,
            enabled: true,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// ASCII-lowercased provider name used for comparisons
    pub fn provider_key(&self) -> String {
        self.provider.to_ascii_lowercase()
    }

    /// Whether this config belongs to `provider` (ASCII case-insensitive,
    /// same rule as `provider_key`)
    pub fn matches_provider(&self, provider: &str) -> bool {
        self.provider_key() == provider.trim().to_ascii_lowercase()
    }

    /// API key safe for display
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(mask_api_key)
    }

    fn apply_tuning(
        mut self,
        temperature: Option<f64>,
        max_tokens: Option<i64>,
        timeout: Option<i64>,
    ) -> Self {
        self.temperature = temperature
            .filter(|t| t.is_finite())
            .unwrap_or(DEFAULT_TEMPERATURE)
            .clamp(0.0, 2.0);
        self.max_tokens = clamp_positive(max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));
        self.timeout = clamp_positive(timeout.unwrap_or(DEFAULT_TIMEOUT));
        self
    }
}

impl fmt::Debug for CanonicalLlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalLlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.masked_api_key())
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Optional key masked for `Debug` output
pub(crate) fn masked(key: &Option<String>) -> Option<String> {
    key.as_deref().map(mask_api_key)
}

/// Show the first and last four characters of a key
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn serialize_masked<S: Serializer>(key: &Option<String>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match key {
        Some(k) => s.serialize_some(&mask_api_key(k)),
        None => s.serialize_none(),
    }
}

fn clamp_positive(value: i64) -> u32 {
    value.clamp(1, i64::from(u32::MAX)) as u32
}

// ============================================================================
// Lenient field readers
// ============================================================================

/// Numeric field stored as double, int32, int64 or numeric string
pub fn bson_f64(value: Option<&Bson>) -> Option<f64> {
    match value? {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integer field stored as int32, int64, whole double or numeric string
pub fn bson_i64(value: Option<&Bson>) -> Option<i64> {
    match value? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.is_finite() => Some(v.round() as i64),
        Bson::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean field stored as bool, number or "true"/"false"
pub fn bson_bool(value: Option<&Bson>) -> Option<bool> {
    match value? {
        Bson::Boolean(v) => Some(*v),
        Bson::Int32(v) => Some(*v != 0),
        Bson::Int64(v) => Some(*v != 0),
        Bson::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// New-schema provider record
// ============================================================================

/// `extra_config` sub-document of a provider record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderExtraConfig {
    pub default_model: Option<String>,
}

/// One document of the `llm_providers` collection
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Bson>,
    pub name: String,
    pub display_name: Option<String>,
    pub model: Option<String>,
    pub extra_config: Option<ProviderExtraConfig>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_base_url: Option<String>,
    pub temperature: Option<Bson>,
    pub max_tokens: Option<Bson>,
    pub timeout: Option<Bson>,
    pub enabled: Option<Bson>,
    pub is_active: Option<Bson>,
    pub created_at: Option<Bson>,
    pub updated_at: Option<Bson>,
}

impl fmt::Debug for ProviderDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDocument")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("model", &self.model)
            .field("extra_config", &self.extra_config)
            .field("api_key", &masked(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_base_url", &self.default_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl ProviderDocument {
    pub fn from_document(doc: Document) -> Result<Self> {
        Ok(bson::from_document(doc)?)
    }

    /// Model named on the record itself, either directly or in `extra_config`
    pub fn explicit_model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                self.extra_config
                    .as_ref()
                    .and_then(|e| e.default_model.as_deref())
                    .filter(|m| !m.trim().is_empty())
            })
    }

    pub fn is_active(&self) -> bool {
        bson_bool(self.is_active.as_ref()).unwrap_or(true)
    }

    /// Record identity as a display string
    pub fn id_string(&self) -> Option<String> {
        self.id.as_ref().map(|id| match id {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Map into canonical shape; `settings_model` is the system-settings preference
    pub fn into_canonical(self, settings_model: Option<&str>) -> CanonicalLlmConfig {
        let model = self
            .explicit_model()
            .or(settings_model.filter(|m| !m.trim().is_empty()))
            .unwrap_or_else(|| default_model_for_provider(&self.name))
            .to_string();
        let enabled = self.is_active();
        let temperature = bson_f64(self.temperature.as_ref());
        let max_tokens = bson_i64(self.max_tokens.as_ref());
        let timeout = bson_i64(self.timeout.as_ref());

        let mut config = CanonicalLlmConfig::new(self.name, model)
            .with_enabled(enabled)
            .apply_tuning(temperature, max_tokens, timeout);
        config.api_key = non_blank(self.api_key);
        config.base_url = non_blank(self.base_url).or(non_blank(self.default_base_url));
        config
    }
}

// ============================================================================
// Legacy system config
// ============================================================================

/// `system_settings` sub-document of the active system config
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub deep_analysis_model: Option<String>,
    pub quick_analysis_model: Option<String>,
}

impl SystemSettings {
    /// Deep-analysis model preferred over quick-analysis
    pub fn preferred_model(&self) -> Option<&str> {
        self.deep_analysis_model
            .as_deref()
            .or(self.quick_analysis_model.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

/// One document of the `system_configs` collection
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemConfigDocument {
    pub is_active: Option<Bson>,
    pub llm_configs: Vec<Document>,
    pub system_settings: Option<SystemSettings>,
}

impl fmt::Debug for SystemConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Embedded entries carry API keys; only their count is shown
        f.debug_struct("SystemConfigDocument")
            .field("is_active", &self.is_active)
            .field("llm_configs", &self.llm_configs.len())
            .field("system_settings", &self.system_settings)
            .finish()
    }
}

impl SystemConfigDocument {
    pub fn from_document(doc: Document) -> Result<Self> {
        Ok(bson::from_document(doc)?)
    }

    pub fn preferred_model(&self) -> Option<&str> {
        self.system_settings
            .as_ref()
            .and_then(SystemSettings::preferred_model)
    }
}

/// One entry of the legacy embedded `llm_configs` list
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyConfigEntry {
    pub provider: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub api_base: Option<String>,
    pub default_base_url: Option<String>,
    pub temperature: Option<Bson>,
    pub max_tokens: Option<Bson>,
    pub timeout: Option<Bson>,
    pub enabled: Option<Bson>,
    pub is_active: Option<Bson>,
}

impl fmt::Debug for LegacyConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyConfigEntry")
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("model", &self.model)
            .field("model_name", &self.model_name)
            .field("api_key", &masked(&self.api_key))
            .field("base_url", &self.base_url)
            .field("api_base", &self.api_base)
            .field("default_base_url", &self.default_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl LegacyConfigEntry {
    pub fn from_document(doc: Document) -> Result<Self> {
        Ok(bson::from_document(doc)?)
    }

    /// Enabled flag, defaulting to true when absent
    pub fn is_enabled(&self) -> bool {
        bson_bool(self.enabled.as_ref())
            .or_else(|| bson_bool(self.is_active.as_ref()))
            .unwrap_or(true)
    }

    pub fn into_canonical(self) -> CanonicalLlmConfig {
        let enabled = self.is_enabled();
        let provider = non_blank(self.provider)
            .or(non_blank(self.name))
            .unwrap_or_else(|| "openai".to_string());
        let model = non_blank(self.model)
            .or(non_blank(self.model_name))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut config = CanonicalLlmConfig::new(provider, model)
            .with_enabled(enabled)
            .apply_tuning(
                bson_f64(self.temperature.as_ref()),
                bson_i64(self.max_tokens.as_ref()),
                bson_i64(self.timeout.as_ref()),
            );
        config.api_key = non_blank(self.api_key);
        config.base_url = non_blank(self.base_url)
            .or(non_blank(self.api_base))
            .or(non_blank(self.default_base_url));
        config
    }
}

// ============================================================================
// StoredConfig
// ============================================================================

/// A raw record tagged by the collection that produced it
#[derive(Debug, Clone)]
pub enum StoredConfig {
    /// `llm_providers` record plus the system-settings model preference
    Provider {
        record: ProviderDocument,
        settings_model: Option<String>,
    },
    /// Entry of the active `system_configs.llm_configs` list
    Legacy(LegacyConfigEntry),
}

impl StoredConfig {
    pub fn into_canonical(self) -> CanonicalLlmConfig {
        match self {
            StoredConfig::Provider {
                record,
                settings_model,
            } => record.into_canonical(settings_model.as_deref()),
            StoredConfig::Legacy(entry) => entry.into_canonical(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("sk-abcdef123456"), "sk-a...3456");
        assert_eq!(mask_api_key("short"), "****");
    }

    #[test]
    fn test_debug_never_prints_key() {
        let cfg = CanonicalLlmConfig::new("openai", "gpt-4o").with_api_key("sk-supersecret99");
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("supersecret"));
        assert!(printed.contains("sk-s...et99"));
    }

    #[test]
    fn test_serialize_masks_key() {
        let cfg = CanonicalLlmConfig::new("openai", "gpt-4o").with_api_key("sk-supersecret99");
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["api_key"], "sk-s...et99");
    }

    #[test]
    fn test_provider_model_precedence() {
        let explicit = ProviderDocument::from_document(doc! {
            "name": "openai",
            "model": "gpt-4.1",
            "extra_config": { "default_model": "gpt-4o-mini" },
        })
        .unwrap();
        assert_eq!(explicit.into_canonical(Some("settings")).model, "gpt-4.1");

        let extra = ProviderDocument::from_document(doc! {
            "name": "openai",
            "extra_config": { "default_model": "gpt-4o-mini" },
        })
        .unwrap();
        assert_eq!(extra.into_canonical(Some("settings")).model, "gpt-4o-mini");

        let settings = ProviderDocument::from_document(doc! { "name": "openai" }).unwrap();
        assert_eq!(settings.into_canonical(Some("o3")).model, "o3");

        let table = ProviderDocument::from_document(doc! { "name": "zhipu" }).unwrap();
        assert_eq!(table.into_canonical(None).model, "glm-4");
    }

    #[test]
    fn test_provider_base_url_fallback() {
        let record = ProviderDocument::from_document(doc! {
            "name": "deepseek",
            "default_base_url": "https://api.deepseek.com",
        })
        .unwrap();
        assert_eq!(
            record.into_canonical(None).base_url.as_deref(),
            Some("https://api.deepseek.com")
        );
    }

    #[test]
    fn test_provider_tuning_is_lenient_and_clamped() {
        let record = ProviderDocument::from_document(doc! {
            "name": "openai",
            "temperature": 5,
            "max_tokens": 0_i64,
            "timeout": "60",
        })
        .unwrap();
        let cfg = record.into_canonical(None);
        assert_eq!(cfg.temperature, 2.0);
        assert_eq!(cfg.max_tokens, 1);
        assert_eq!(cfg.timeout, 60);
    }

    #[test]
    fn test_legacy_entry_field_aliases() {
        let entry = LegacyConfigEntry::from_document(doc! {
            "name": "dashscope",
            "model_name": "qwen-max",
            "api_base": "https://dashscope.example/v1",
            "max_tokens": 8000,
            "temperature": 0.3,
        })
        .unwrap();
        assert!(entry.is_enabled());
        let cfg = entry.into_canonical();
        assert_eq!(cfg.provider, "dashscope");
        assert_eq!(cfg.model, "qwen-max");
        assert_eq!(cfg.base_url.as_deref(), Some("https://dashscope.example/v1"));
        assert_eq!(cfg.max_tokens, 8000);
        assert_eq!(cfg.temperature, 0.3);
        assert_eq!(cfg.timeout, 180);
    }

    #[test]
    fn test_legacy_entry_defaults() {
        let cfg = LegacyConfigEntry::default().into_canonical();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.model, "gpt-4o");
        assert!(cfg.enabled);
    }

    #[test]
    fn test_legacy_entry_disabled() {
        let entry = LegacyConfigEntry::from_document(doc! { "enabled": false }).unwrap();
        assert!(!entry.is_enabled());
    }

    #[test]
    fn test_system_settings_prefers_deep_model() {
        let sys = SystemConfigDocument::from_document(doc! {
            "system_settings": {
                "deep_analysis_model": "deep",
                "quick_analysis_model": "quick",
            }
        })
        .unwrap();
        assert_eq!(sys.preferred_model(), Some("deep"));
    }

    #[test]
    fn test_matches_provider_case_insensitive() {
        let cfg = CanonicalLlmConfig::new("DeepSeek", "deepseek-chat");
        assert!(cfg.matches_provider("deepseek"));
        assert!(cfg.matches_provider(" DEEPSEEK "));
        assert_eq!(cfg.provider_key(), "deepseek");
    }

    #[test]
    fn test_matches_provider_agrees_with_provider_key() {
        for (provider, query) in [
            ("DeepSeek", "deepseek"),
            ("ÄPI", "äpi"),
            ("ÄPI", "Äpi"),
            ("qwen", "QWEN"),
            ("openai", "anthropic"),
        ] {
            let cfg = CanonicalLlmConfig::new(provider, "m");
            let query_key = CanonicalLlmConfig::new(query, "m").provider_key();
            assert_eq!(
                cfg.matches_provider(query),
                cfg.provider_key() == query_key,
                "{} vs {}",
                provider,
                query
            );
        }
        assert!(!CanonicalLlmConfig::new("ÄPI", "m").matches_provider("äpi"));
    }

    #[test]
    fn test_record_debug_masks_keys() {
        let record = ProviderDocument::from_document(doc! {
            "name": "openai",
            "api_key": "sk-supersecret99",
        })
        .unwrap();
        let printed = format!("{:?}", record);
        assert!(!printed.contains("supersecret"));
        assert!(printed.contains("sk-s...et99"));

        let entry = LegacyConfigEntry::from_document(doc! {
            "provider": "openai",
            "api_key": "sk-supersecret99",
        })
        .unwrap();
        assert!(!format!("{:?}", entry).contains("supersecret"));

        let system = SystemConfigDocument::from_document(doc! {
            "llm_configs": [{ "provider": "openai", "api_key": "sk-supersecret99" }],
        })
        .unwrap();
        assert!(!format!("{:?}", system).contains("supersecret"));
    }

    #[test]
    fn test_backup_name() {
        assert_eq!(collections::backup_of("llm_configs"), "llm_configs_backup");
    }
}
