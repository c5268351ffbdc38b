// Config resolution command
//
// Shows what the loader resolves right now. An unreachable store is not an
// error here: resolution degrades to the environment like it does in-process.

use anyhow::{bail, Result};
use llmconf_core::{CanonicalLlmConfig, ConfigCache, ConfigLoader, EnvVars};
use llmconf_storage::StorageBackend;
use serde::Serialize;

use super::StoreArgs;
use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};

#[derive(Debug, Serialize)]
struct Resolution {
    configs: Vec<CanonicalLlmConfig>,
    active: Option<CanonicalLlmConfig>,
}

pub async fn run(
    store: &StoreArgs,
    env: EnvVars,
    output: OutputFormat,
    provider: Option<String>,
) -> Result<()> {
    let backend = match store.connect().await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(error = %e, "Store unavailable, resolving from environment only");
            StorageBackend::in_memory()
        }
    };
    let cache = ConfigCache::new(ConfigLoader::new(backend.into_shared(), env));

    if let Some(provider) = provider {
        let Some(config) = cache.by_provider(&provider).await else {
            bail!("No enabled LLM config for provider '{}'", provider);
        };
        if output.is_text() {
            print_config(&config);
        } else {
            output.print_value(&config)?;
        }
        return Ok(());
    }

    let configs = cache.get(true).await;
    let resolution = Resolution {
        configs: configs.to_vec(),
        active: cache.active().await,
    };

    if !output.is_text() {
        return output.print_value(&resolution);
    }

    if resolution.configs.is_empty() {
        println!("No LLM configs resolved (store empty and no provider API keys in environment)");
        return Ok(());
    }

    let columns = [
        ("PROVIDER", 12),
        ("MODEL", 28),
        ("API KEY", 15),
        ("ENABLED", 7),
        ("BASE URL", 40),
    ];
    print_table_header(&columns);
    for config in &resolution.configs {
        let api_key = config.masked_api_key().unwrap_or_default();
        let enabled = if config.enabled { "yes" } else { "no" };
        let base_url = config.base_url.as_deref().unwrap_or("");
        print_table_row(&[
            (config.provider.as_str(), 12),
            (config.model.as_str(), 28),
            (api_key.as_str(), 15),
            (enabled, 7),
            (base_url, 40),
        ]);
    }
    println!();
    match &resolution.active {
        Some(active) => println!("Active: {}/{}", active.provider, active.model),
        None => println!("Active: (none enabled)"),
    }
    Ok(())
}

fn print_config(config: &CanonicalLlmConfig) {
    print_field("Provider", &config.provider);
    print_field("Model", &config.model);
    print_field(
        "API key",
        config.masked_api_key().as_deref().unwrap_or("(not set)"),
    );
    print_field("Base URL", config.base_url.as_deref().unwrap_or("(default)"));
    print_field("Temperature", &config.temperature.to_string());
    print_field("Max tokens", &config.max_tokens.to_string());
    print_field("Timeout", &format!("{}s", config.timeout));
    print_field("Enabled", &config.enabled.to_string());
}
