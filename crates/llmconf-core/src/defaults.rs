// Built-in provider defaults
//
// Used when a stored provider record names no model, and for the
// environment-variable fallback tier.

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 4000;
pub const DEFAULT_TIMEOUT: i64 = 180;
pub const DEFAULT_CURRENCY: &str = "CNY";

/// Default model per provider name (lowercase)
const PROVIDER_DEFAULT_MODELS: &[(&str, &str)] = &[
    ("openai", "gpt-4o"),
    ("deepseek", "deepseek-chat"),
    ("google", "gemini-2.0-flash"),
    ("dashscope", "qwen-plus"),
    ("anthropic", "claude-3-5-sonnet-20241022"),
    ("gemini", "gemini-2.0-flash"),
    ("zhipu", "glm-4"),
    ("qwen", "qwen-plus"),
    // Aggregator
    ("302ai", "gpt-4o"),
    ("openrouter", "openai/gpt-4o"),
];

/// Default model for a provider, case-insensitive; unknown providers get gpt-4o
pub fn default_model_for_provider(provider: &str) -> &'static str {
    let key = provider.trim().to_ascii_lowercase();
    PROVIDER_DEFAULT_MODELS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, model)| *model)
        .unwrap_or(DEFAULT_MODEL)
}

/// A provider that can be configured purely from environment variables
#[derive(Debug, Clone, Copy)]
pub struct EnvProvider {
    pub provider: &'static str,
    pub api_key_var: &'static str,
    pub default_base_url: &'static str,
    pub default_model: &'static str,
}

impl EnvProvider {
    /// `<PROVIDER>_BASE_URL`
    pub fn base_url_var(&self) -> String {
        format!("{}_BASE_URL", self.provider.to_uppercase())
    }

    /// `<PROVIDER>_MODEL`
    pub fn model_var(&self) -> String {
        format!("{}_MODEL", self.provider.to_uppercase())
    }
}

/// Providers probed by the environment fallback, in result order
pub const ENV_PROVIDERS: &[EnvProvider] = &[
    EnvProvider {
        provider: "openai",
        api_key_var: "OPENAI_API_KEY",
        default_base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o",
    },
    EnvProvider {
        provider: "deepseek",
        api_key_var: "DEEPSEEK_API_KEY",
        default_base_url: "https://api.deepseek.com",
        default_model: "deepseek-chat",
    },
    EnvProvider {
        provider: "google",
        api_key_var: "GOOGLE_API_KEY",
        default_base_url: "https://generativelanguage.googleapis.com/v1beta",
        default_model: "gemini-2.0-flash",
    },
    EnvProvider {
        provider: "dashscope",
        api_key_var: "DASHSCOPE_API_KEY",
        default_base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
        default_model: "qwen-plus",
    },
    EnvProvider {
        provider: "anthropic",
        api_key_var: "ANTHROPIC_API_KEY",
        default_base_url: "https://api.anthropic.com",
        default_model: "claude-3-5-sonnet-20241022",
    },
];
