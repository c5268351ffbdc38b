// Integration tests for config resolution
//
// Drive the loader, cache, accessors and config service against the
// in-memory document store.
//
// Run with: cargo test -p llmconf-core --test resolution_test

use llmconf_core::{
    collections, ConfigCache, ConfigError, ConfigLoader, ConfigUpsert, EnvVars,
    ExecutionBaseline, InMemoryDocumentStore, LlmConfigService, MockLlmInvoker,
};
use mongodb::bson::doc;
use serde_json::json;
use std::sync::Arc;

fn setup(env: EnvVars) -> (Arc<InMemoryDocumentStore>, Arc<ConfigCache>) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let cache = Arc::new(ConfigCache::new(ConfigLoader::new(store.clone(), env)));
    (store, cache)
}

// ============================================================================
// Loader tiers
// ============================================================================

#[tokio::test]
async fn test_deepseek_provider_without_model_resolves_default_model() {
    let (store, cache) = setup(EnvVars::default());
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "deepseek", "is_active": true, "api_key": "sk-abc123" }],
    );

    let configs = cache.get(true).await;
    assert_eq!(configs.len(), 1);
    let config = &configs[0];
    assert_eq!(config.provider, "deepseek");
    assert_eq!(config.model, "deepseek-chat");
    assert_eq!(config.api_key.as_deref(), Some("sk-abc123"));
    assert!(config.enabled);
}

#[tokio::test]
async fn test_system_settings_model_used_when_record_names_none() {
    let (store, cache) = setup(EnvVars::default());
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "openai", "is_active": true, "api_key": "sk-open" }],
    );
    store.seed(
        collections::SYSTEM_CONFIGS,
        vec![doc! {
            "is_active": true,
            "system_settings": { "quick_analysis_model": "gpt-4o-mini" },
        }],
    );

    let active = cache.active().await.unwrap();
    assert_eq!(active.model, "gpt-4o-mini");
}

#[tokio::test]
async fn test_inactive_providers_fall_through_to_system_configs() {
    let (store, cache) = setup(EnvVars::from_pairs([("OPENAI_API_KEY", "sk-env")]));
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "openai", "is_active": false }],
    );
    store.seed(
        collections::SYSTEM_CONFIGS,
        vec![doc! {
            "is_active": true,
            "llm_configs": [
                { "provider": "dashscope", "model_name": "qwen-max", "enabled": false },
                { "provider": "google", "model_name": "gemini-1.5-pro", "temperature": 0.3 },
            ],
        }],
    );

    let configs = cache.get(true).await;
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].provider, "google");
    assert_eq!(configs[0].model, "gemini-1.5-pro");
    assert_eq!(configs[0].temperature, 0.3);
}

#[tokio::test]
async fn test_provider_query_failure_falls_through_to_system_configs() {
    let (store, cache) = setup(EnvVars::from_pairs([("OPENAI_API_KEY", "sk-env")]));
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "deepseek", "is_active": true, "api_key": "sk-abc123" }],
    );
    store.seed(
        collections::SYSTEM_CONFIGS,
        vec![doc! {
            "is_active": true,
            "llm_configs": [{ "provider": "google", "model_name": "gemini-1.5-pro" }],
        }],
    );
    store.fail_collection(collections::LLM_PROVIDERS);

    let providers: Vec<String> = cache
        .get(true)
        .await
        .iter()
        .map(|c| c.provider.clone())
        .collect();
    assert_eq!(providers, vec!["google"]);
}

#[tokio::test]
async fn test_provider_records_win_over_system_configs_without_mixing() {
    let (store, cache) = setup(EnvVars::from_pairs([("OPENAI_API_KEY", "sk-env")]));
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "deepseek", "is_active": true, "api_key": "sk-abc123" }],
    );
    store.seed(
        collections::SYSTEM_CONFIGS,
        vec![doc! {
            "is_active": true,
            "llm_configs": [{ "provider": "google", "model_name": "gemini-1.5-pro" }],
        }],
    );

    let providers: Vec<String> = cache
        .get(true)
        .await
        .iter()
        .map(|c| c.provider.clone())
        .collect();
    assert_eq!(providers, vec!["deepseek"]);
}

#[tokio::test]
async fn test_env_fallback_when_store_is_empty() {
    let (_store, cache) = setup(EnvVars::from_pairs([
        ("GOOGLE_API_KEY", "g-key-123456"),
        ("DASHSCOPE_API_KEY", "your_dashscope_api_key"),
    ]));

    let configs = cache.get(true).await;
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].provider, "google");
    assert_eq!(configs[0].model, "gemini-2.0-flash");
    assert!(configs[0].enabled);
}

#[tokio::test]
async fn test_env_fallback_when_store_is_unavailable() {
    let (store, cache) = setup(EnvVars::from_pairs([("ANTHROPIC_API_KEY", "sk-ant-key")]));
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "openai", "is_active": true }],
    );
    store.set_unavailable(true);

    let configs = cache.get(true).await;
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].provider, "anthropic");
    assert_eq!(configs[0].model, "claude-3-5-sonnet-20241022");
}

#[tokio::test]
async fn test_nothing_configured_yields_empty_list() {
    let (_store, cache) = setup(EnvVars::default());
    assert!(cache.get(true).await.is_empty());
    assert!(cache.active().await.is_none());
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_cached_list_survives_store_changes_until_invalidated() {
    let (store, cache) = setup(EnvVars::default());
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "openai", "is_active": true, "model": "gpt-4o" }],
    );

    let first = cache.get(true).await;
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! { "name": "deepseek", "is_active": true }],
    );
    let second = cache.get(true).await;
    assert_eq!(first, second);
    assert_eq!(second.len(), 1);

    cache.invalidate();
    let third = cache.get(true).await;
    assert_eq!(third.len(), 2);
    assert_eq!(third[1].provider, "deepseek");
}

#[tokio::test]
async fn test_reload_requeries_store() {
    let (store, cache) = setup(EnvVars::default());
    cache.get(true).await;
    let queries = store.query_count();

    cache.reload().await;
    assert!(store.query_count() > queries);
    assert!(cache.is_populated());
}

// ============================================================================
// Accessors
// ============================================================================

#[tokio::test]
async fn test_active_skips_disabled_records() {
    let (store, cache) = setup(EnvVars::default());
    store.seed(
        collections::SYSTEM_CONFIGS,
        vec![doc! {
            "is_active": true,
            "llm_configs": [
                { "provider": "openai", "model": "gpt-4o", "enabled": false },
                { "provider": "deepseek", "model": "deepseek-chat", "enabled": true },
            ],
        }],
    );

    let active = cache.active().await.unwrap();
    assert_eq!(active.provider, "deepseek");
    assert!(cache.by_provider("OpenAI").await.is_none());
    assert_eq!(
        cache.by_provider("DeepSeek").await.unwrap().model,
        "deepseek-chat"
    );
}

#[tokio::test]
async fn test_project_for_execution_overwrites_llm_keys() {
    let (store, cache) = setup(EnvVars::default());
    store.seed(
        collections::LLM_PROVIDERS,
        vec![doc! {
            "name": "deepseek",
            "is_active": true,
            "api_key": "sk-abc123",
            "default_base_url": "https://api.deepseek.com",
        }],
    );
    let baseline = ExecutionBaseline::from_env(&EnvVars::default());

    let settings = cache.project_for_execution(&baseline).await;
    assert_eq!(settings["llm_provider"], json!("deepseek"));
    assert_eq!(settings["deep_think_llm"], json!("deepseek-chat"));
    assert_eq!(settings["quick_think_llm"], json!("deepseek-chat"));
    assert_eq!(settings["backend_url"], json!("https://api.deepseek.com"));
    assert_eq!(settings["deep_api_key"], json!("sk-abc123"));
    assert_eq!(settings["quick_provider"], json!("deepseek"));
    assert_eq!(settings["max_debate_rounds"], baseline.settings()["max_debate_rounds"]);
}

#[tokio::test]
async fn test_project_for_execution_without_active_keeps_baseline() {
    let (_store, cache) = setup(EnvVars::default());
    let baseline = ExecutionBaseline::from_env(&EnvVars::default());
    let settings = cache.project_for_execution(&baseline).await;
    assert_eq!(&settings, baseline.settings());
}

// ============================================================================
// Config service
// ============================================================================

#[tokio::test]
async fn test_create_invalidates_cache() {
    let (store, cache) = setup(EnvVars::default());
    let service = LlmConfigService::new(store.clone(), cache.clone());
    assert!(cache.get(true).await.is_empty());

    let mut request = ConfigUpsert::new("deepseek", "DeepSeek", "deepseek-chat");
    request.api_key = Some("sk-abcdef123456".into());
    let view = service.upsert(request).await.unwrap();
    assert_eq!(view.api_key.as_deref(), Some("sk-a...3456"));
    assert!(!cache.is_populated());

    let active = cache.active().await.unwrap();
    assert_eq!(active.provider, "deepseek");
    assert_eq!(active.api_key.as_deref(), Some("sk-abcdef123456"));
}

#[tokio::test]
async fn test_update_keeps_key_when_blank_and_disables() {
    let (store, cache) = setup(EnvVars::default());
    let service = LlmConfigService::new(store.clone(), cache.clone());

    let mut request = ConfigUpsert::new("openai", "OpenAI", "gpt-4o");
    request.api_key = Some("sk-original-key".into());
    let created = service.upsert(request).await.unwrap();

    let mut update = ConfigUpsert::new("openai", "OpenAI", "gpt-4.1");
    update.id = Some(created.id.clone());
    update.api_key = Some("  ".into());
    update.enabled = false;
    let updated = service.upsert(update).await.unwrap();
    assert_eq!(updated.model, "gpt-4.1");
    assert!(!updated.enabled);

    let stored = store.documents(collections::LLM_PROVIDERS);
    assert_eq!(stored[0].get_str("api_key").unwrap(), "sk-original-key");
    assert!(cache.active().await.is_none());
}

#[tokio::test]
async fn test_update_and_delete_missing_record_not_found() {
    let (store, cache) = setup(EnvVars::default());
    let service = LlmConfigService::new(store, cache);
    let missing = "64b7f0c2a1b2c3d4e5f60718";

    let mut update = ConfigUpsert::new("openai", "OpenAI", "gpt-4o");
    update.id = Some(missing.into());
    assert!(matches!(
        service.upsert(update).await,
        Err(ConfigError::NotFound(_))
    ));
    assert!(matches!(
        service.delete(missing).await,
        Err(ConfigError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_sorted_by_name_and_delete() {
    let (store, cache) = setup(EnvVars::default());
    let service = LlmConfigService::new(store, cache.clone());
    for name in ["openai", "anthropic", "deepseek"] {
        service
            .upsert(ConfigUpsert::new(name, name, "m"))
            .await
            .unwrap();
    }

    let names: Vec<String> = service.list().await.unwrap().into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec!["anthropic", "deepseek", "openai"]);

    let first = cache.active().await.unwrap();
    assert_eq!(first.provider, "openai");
    let openai = service
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|v| v.name == "openai")
        .unwrap();
    service.delete(&openai.id).await.unwrap();
    assert_eq!(cache.active().await.unwrap().provider, "anthropic");
}

#[tokio::test]
async fn test_connection_uses_stored_key_and_truncates_preview() {
    let (store, cache) = setup(EnvVars::default());
    let invoker = Arc::new(MockLlmInvoker::replying("x".repeat(250)));
    let service = LlmConfigService::new(store, cache).with_invoker(invoker.clone());

    let mut request = ConfigUpsert::new("deepseek", "DeepSeek", "deepseek-chat");
    request.api_key = Some("sk-abc123".into());
    let created = service.upsert(request).await.unwrap();

    let outcome = service.test_connection(&created.id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.response_preview.unwrap().chars().count(), 100);

    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    let (sent, prompt) = &calls[0];
    assert_eq!(prompt, "Hi");
    assert_eq!(sent.api_key.as_deref(), Some("sk-abc123"));
    assert_eq!(sent.max_tokens, 100);
    assert_eq!(sent.timeout, 30);
    assert_eq!(sent.temperature, 0.7);
}

#[tokio::test]
async fn test_connection_soft_failures() {
    let (store, cache) = setup(EnvVars::default());
    let service = LlmConfigService::new(store, cache)
        .with_invoker(Arc::new(MockLlmInvoker::failing("401 Unauthorized")));

    let keyless = service
        .upsert(ConfigUpsert::new("openai", "OpenAI", "gpt-4o"))
        .await
        .unwrap();
    let outcome = service.test_connection(&keyless.id).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("No API key"));

    let mut request = ConfigUpsert::new("google", "Google", "gemini-2.0-flash");
    request.api_key = Some("g-key-123456".into());
    let keyed = service.upsert(request).await.unwrap();
    let outcome = service.test_connection(&keyed.id).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("401"));

    let outcome = service
        .test_connection("64b7f0c2a1b2c3d4e5f60718")
        .await
        .unwrap();
    assert!(!outcome.success);
}
