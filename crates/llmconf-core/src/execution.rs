// Execution projection
//
// Shapes a canonical config into what the downstream graph-execution
// component and the execution capability expect.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

use crate::defaults::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};
use crate::env::EnvVars;
use crate::models::{mask_api_key, CanonicalLlmConfig};

/// Settings mapping handed to the graph-execution component
pub type ExecutionSettings = Map<String, Value>;

/// Arguments accepted by the execution capability
#[derive(Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: u32,
}

impl fmt::Debug for ExecutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CanonicalLlmConfig {
    /// Arguments for the execution capability, full credentials included
    pub fn to_execution_request(&self) -> ExecutionRequest {
        ExecutionRequest {
            provider: self.provider.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        }
    }
}

/// Baseline settings used when no active config exists
#[derive(Clone)]
pub struct ExecutionBaseline {
    settings: ExecutionSettings,
}

impl fmt::Debug for ExecutionBaseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut settings = self.settings.clone();
        for (key, value) in settings.iter_mut() {
            if !key.ends_with("api_key") {
                continue;
            }
            if let Some(masked) = value.as_str().map(mask_api_key) {
                *value = Value::String(masked);
            }
        }
        f.debug_struct("ExecutionBaseline")
            .field("settings", &settings)
            .finish()
    }
}

impl ExecutionBaseline {
    /// Baseline driven by `LLM_PROVIDER`, `DEEP_THINK_LLM`, `QUICK_THINK_LLM`
    /// and `LLM_BACKEND_URL`, with per-provider API keys from the environment
    pub fn from_env(env: &EnvVars) -> Self {
        let provider = env.get_or("LLM_PROVIDER", "openai").to_string();
        let api_key_var = format!("{}_API_KEY", provider.to_uppercase());
        let api_key = env.configured(&api_key_var).map(str::to_string);

        let settings = json!({
            "llm_provider": provider,
            "deep_think_llm": env.get_or("DEEP_THINK_LLM", "o4-mini"),
            "quick_think_llm": env.get_or("QUICK_THINK_LLM", "gpt-4o-mini"),
            "backend_url": env.get_or("LLM_BACKEND_URL", "https://api.openai.com/v1"),
            "deep_provider": provider,
            "quick_provider": provider,
            "deep_api_key": api_key,
            "quick_api_key": api_key,
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "timeout": DEFAULT_TIMEOUT,
            "max_debate_rounds": 1,
            "max_risk_discuss_rounds": 1,
            "online_tools": true,
        });

        Self::from_settings(match settings {
            Value::Object(map) => map,
            _ => Map::new(),
        })
    }

    /// Baseline from an explicit mapping
    pub fn from_settings(settings: ExecutionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Baseline overwritten with the active config; both deep and quick slots
    /// receive the same provider, model and credentials
    pub fn project(&self, active: Option<&CanonicalLlmConfig>) -> ExecutionSettings {
        let mut settings = self.settings.clone();
        let Some(active) = active else {
            tracing::info!("No active LLM config in store, using baseline settings");
            return settings;
        };

        let overrides = [
            ("llm_provider", json!(active.provider)),
            ("deep_think_llm", json!(active.model)),
            ("quick_think_llm", json!(active.model)),
            (
                "backend_url",
                json!(active.base_url.clone().unwrap_or_default()),
            ),
            ("deep_provider", json!(active.provider)),
            ("quick_provider", json!(active.provider)),
            ("deep_api_key", json!(active.api_key)),
            ("quick_api_key", json!(active.api_key)),
        ];
        for (key, value) in overrides {
            settings.insert(key.to_string(), value);
        }

        tracing::info!(
            provider = %active.provider,
            model = %active.model,
            "Using LLM config from store"
        );
        settings
    }
}
