// Config accessors
//
// Views over the cached list. "Active" is simply the first enabled entry in
// resolution order; there is no priority weighting.

use crate::cache::ConfigCache;
use crate::execution::{ExecutionBaseline, ExecutionSettings};
use crate::models::CanonicalLlmConfig;

/// First enabled config
pub fn first_enabled(configs: &[CanonicalLlmConfig]) -> Option<&CanonicalLlmConfig> {
    configs.iter().find(|c| c.enabled)
}

/// First enabled config for `provider` (case-insensitive); disabled matches count as absent
pub fn find_by_provider<'a>(
    configs: &'a [CanonicalLlmConfig],
    provider: &str,
) -> Option<&'a CanonicalLlmConfig> {
    configs
        .iter()
        .find(|c| c.matches_provider(provider) && c.enabled)
}

impl ConfigCache {
    /// First enabled config from the cached list
    pub async fn active(&self) -> Option<CanonicalLlmConfig> {
        let configs = self.get(true).await;
        first_enabled(&configs).cloned()
    }

    /// First enabled config for `provider` from the cached list
    pub async fn by_provider(&self, provider: &str) -> Option<CanonicalLlmConfig> {
        let configs = self.get(true).await;
        find_by_provider(&configs, provider).cloned()
    }

    /// Execution-ready settings: `baseline` overwritten with the active config
    pub async fn project_for_execution(&self, baseline: &ExecutionBaseline) -> ExecutionSettings {
        let active = self.active().await;
        baseline.project(active.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs() -> Vec<CanonicalLlmConfig> {
        vec![
            CanonicalLlmConfig::new("openai", "gpt-4o").with_enabled(false),
            CanonicalLlmConfig::new("deepseek", "deepseek-chat"),
            CanonicalLlmConfig::new("DeepSeek", "deepseek-reasoner"),
        ]
    }

    #[test]
    fn test_first_enabled_skips_disabled() {
        let list = configs();
        assert_eq!(first_enabled(&list).unwrap().provider, "deepseek");
    }

    #[test]
    fn test_first_enabled_none_when_all_disabled() {
        let list = vec![
            CanonicalLlmConfig::new("openai", "gpt-4o").with_enabled(false),
            CanonicalLlmConfig::new("google", "gemini-2.0-flash").with_enabled(false),
        ];
        assert!(first_enabled(&list).is_none());
        assert!(first_enabled(&[]).is_none());
    }

    #[test]
    fn test_find_by_provider_case_insensitive_first_match() {
        let list = configs();
        let found = find_by_provider(&list, "DEEPSEEK").unwrap();
        assert_eq!(found.model, "deepseek-chat");
    }

    #[test]
    fn test_find_by_provider_ignores_disabled() {
        let list = configs();
        assert!(find_by_provider(&list, "openai").is_none());
        assert!(find_by_provider(&list, "anthropic").is_none());
    }
}
