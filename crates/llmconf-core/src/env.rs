// Environment snapshot
//
// Resolution reads environment variables through this snapshot instead of
// calling std::env directly, so tests can supply variables without touching
// the process environment.

use std::collections::HashMap;

/// Values starting with this prefix are template placeholders, not real settings
pub const PLACEHOLDER_PREFIX: &str = "your_";

/// Immutable snapshot of environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a variable, treating empty values as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Get the first set variable among `keys`
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// Get a variable or a default
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Get a variable unless it looks like an unfilled template value
    pub fn configured(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !is_placeholder(v))
    }
}

/// Whether a value is a `your_...` template placeholder
pub fn is_placeholder(value: &str) -> bool {
    value.starts_with(PLACEHOLDER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_unset() {
        let env = EnvVars::from_pairs([("A", ""), ("B", "x")]);
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some("x"));
    }

    #[test]
    fn test_first_of() {
        let env = EnvVars::from_pairs([("MONGO_URI", "mongodb://b")]);
        assert_eq!(
            env.first_of(&["MONGODB_CONNECTION_STRING", "MONGO_URI"]),
            Some("mongodb://b")
        );
    }

    #[test]
    fn test_configured_skips_placeholders() {
        let env = EnvVars::from_pairs([
            ("OPENAI_API_KEY", "your_openai_api_key_here"),
            ("DEEPSEEK_API_KEY", "sk-real"),
        ]);
        assert_eq!(env.configured("OPENAI_API_KEY"), None);
        assert_eq!(env.configured("DEEPSEEK_API_KEY"), Some("sk-real"));
    }
}
