// Schema migration
//
// One-shot batch transform from the legacy three-collection schema
// (llm_providers -> model_catalogs -> llm_configs) into the flattened
// simplified_llm_configs collection.
//
// Four independent operations, no implicit transitions between them:
// backup, migrate (backs up first), validate, rollback.
//
// Intended for an offline, single-operator run. No lock is taken against
// concurrent writers.

use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::defaults::{DEFAULT_CURRENCY, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};
use crate::error::{ConfigError, Result};
use crate::models::{bson_bool, bson_f64, bson_i64, collections, masked, ProviderDocument};
use crate::traits::DocumentStore;

/// Fields every destination document must carry
pub const REQUIRED_FIELDS: [&str; 4] = ["provider", "provider_name", "model_name", "model_display_name"];

// ============================================================================
// Legacy input records
// ============================================================================

/// Entry of a legacy model catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogModel {
    pub name: String,
    pub display_name: Option<String>,
    pub input_price_per_1k: Option<Bson>,
    pub output_price_per_1k: Option<Bson>,
    pub currency: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

/// One document of `model_catalogs`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelCatalogDocument {
    pub provider: String,
    pub models: Vec<CatalogModel>,
}

/// One document of the legacy `llm_configs` collection
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyLlmConfig {
    pub provider: String,
    pub model_name: String,
    pub model_display_name: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub max_tokens: Option<Bson>,
    pub temperature: Option<Bson>,
    pub timeout: Option<Bson>,
    pub enabled: Option<Bson>,
    pub suitable_roles: Option<Vec<String>>,
    pub description: Option<String>,
    pub created_at: Option<Bson>,
}

impl fmt::Debug for LegacyLlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyLlmConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("model_display_name", &self.model_display_name)
            .field("api_key", &masked(&self.api_key))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .field("suitable_roles", &self.suitable_roles)
            .field("description", &self.description)
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ============================================================================
// Destination record
// ============================================================================

/// Flattened provider+model record of `simplified_llm_configs`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedLlmConfig {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub provider: String,
    pub provider_name: String,
    pub model_name: String,
    pub model_display_name: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub max_tokens: i64,
    pub temperature: f64,
    pub timeout: i64,
    pub enabled: bool,
    pub is_default: bool,
    pub input_price: Option<f64>,
    pub output_price: Option<f64>,
    pub currency: String,
    pub capabilities: Vec<String>,
    pub suitable_for: Vec<String>,
    pub description: Option<String>,
    pub created_at: Bson,
    pub updated_at: DateTime,
}

impl fmt::Debug for SimplifiedLlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimplifiedLlmConfig")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .field("model_display_name", &self.model_display_name)
            .field("api_key", &masked(&self.api_key))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .field("is_default", &self.is_default)
            .field("input_price", &self.input_price)
            .field("output_price", &self.output_price)
            .field("currency", &self.currency)
            .field("capabilities", &self.capabilities)
            .field("suitable_for", &self.suitable_for)
            .field("description", &self.description)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Lookup tables built from the legacy provider and catalog collections
#[derive(Debug, Default)]
pub struct LegacyLookup {
    providers: HashMap<String, ProviderDocument>,
    catalogs: HashMap<String, HashMap<String, CatalogModel>>,
}

impl LegacyLookup {
    pub fn new(providers: Vec<ProviderDocument>, catalogs: Vec<ModelCatalogDocument>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        // A later catalog for the same provider replaces the earlier one
        let mut catalog_map = HashMap::new();
        for catalog in catalogs {
            let models = catalog
                .models
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect();
            catalog_map.insert(catalog.provider, models);
        }

        Self {
            providers,
            catalogs: catalog_map,
        }
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderDocument> {
        self.providers.get(name)
    }

    pub fn catalog_entry(&self, provider: &str, model: &str) -> Option<&CatalogModel> {
        self.catalogs.get(provider).and_then(|m| m.get(model))
    }
}

/// Merge one legacy config with its provider and catalog entry
///
/// Per field: the config's own value, then the provider's, then the catalog's,
/// then the built-in default.
pub fn synthesize(config: LegacyLlmConfig, lookup: &LegacyLookup, now: DateTime) -> SimplifiedLlmConfig {
    let provider = lookup.provider(&config.provider);
    let catalog = lookup.catalog_entry(&config.provider, &config.model_name);

    let provider_name = provider
        .and_then(|p| non_blank(p.display_name.as_deref()))
        .unwrap_or_else(|| config.provider.clone());
    let model_display_name = non_blank(config.model_display_name.as_deref())
        .or_else(|| catalog.and_then(|c| non_blank(c.display_name.as_deref())))
        .unwrap_or_else(|| config.model_name.clone());
    let api_key = non_blank(config.api_key.as_deref())
        .or_else(|| provider.and_then(|p| non_blank(p.api_key.as_deref())));
    let api_base = non_blank(config.api_base.as_deref())
        .or_else(|| provider.and_then(|p| non_blank(p.default_base_url.as_deref())));

    SimplifiedLlmConfig {
        id: ObjectId::new(),
        provider_name,
        model_display_name,
        api_key,
        api_base,
        max_tokens: bson_i64(config.max_tokens.as_ref()).unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: bson_f64(config.temperature.as_ref()).unwrap_or(DEFAULT_TEMPERATURE),
        timeout: bson_i64(config.timeout.as_ref()).unwrap_or(DEFAULT_TIMEOUT),
        enabled: bson_bool(config.enabled.as_ref()).unwrap_or(true),
        is_default: false,
        input_price: catalog.and_then(|c| bson_f64(c.input_price_per_1k.as_ref())),
        output_price: catalog.and_then(|c| bson_f64(c.output_price_per_1k.as_ref())),
        currency: catalog
            .and_then(|c| non_blank(c.currency.as_deref()))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        capabilities: catalog
            .and_then(|c| c.capabilities.clone())
            .unwrap_or_default(),
        suitable_for: config.suitable_roles.unwrap_or_default(),
        description: config.description,
        created_at: config
            .created_at
            .filter(|c| !matches!(c, Bson::Null))
            .unwrap_or(Bson::DateTime(now)),
        updated_at: now,
        provider: config.provider,
        model_name: config.model_name,
    }
}

/// Mark the first enabled record as default and every other record as not
pub fn assign_default(records: &mut [SimplifiedLlmConfig]) {
    let first_enabled = records.iter().position(|r| r.enabled);
    for (index, record) in records.iter_mut().enumerate() {
        record.is_default = Some(index) == first_enabled;
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Document count of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    pub collection: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    /// Collections copied into their `_backup` sibling
    pub backed_up: Vec<CollectionCount>,
    /// Empty collections whose previous backup was left in place
    pub skipped: Vec<String>,
}

impl BackupReport {
    pub fn total(&self) -> u64 {
        self.backed_up.iter().map(|c| c.count).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub backup: BackupReport,
    pub providers_read: usize,
    pub catalogs_read: usize,
    pub configs_read: usize,
    pub migrated: usize,
    /// Legacy records that could not be decoded
    pub skipped_records: usize,
    /// Providers referenced by configs but absent from `llm_providers`
    pub unmatched_providers: Vec<String>,
    /// `provider/model` of the record marked default
    pub default_config: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub destination_count: u64,
    pub backup_count: u64,
    /// Destination holds no documents (a warning, not a failure)
    pub empty: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackReport {
    pub cleared_destination: u64,
    pub restored: Vec<CollectionCount>,
    /// Collections left untouched because their backup was empty
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub migration: MigrationReport,
    pub validation: ValidationReport,
}

// ============================================================================
// Migrator
// ============================================================================

/// Runs the legacy-to-simplified migration against a document store
pub struct Migrator {
    store: Arc<dyn DocumentStore>,
}

impl Migrator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Snapshot every non-empty legacy collection into `<collection>_backup`,
    /// replacing the previous backup
    ///
    /// An empty collection is not snapshotted, so its previous backup (if any)
    /// survives and still holds an earlier run's data.
    pub async fn backup(&self) -> Result<BackupReport> {
        tracing::info!("Backing up legacy collections");
        let mut report = BackupReport::default();

        for collection in collections::LEGACY {
            let documents = self.store.find(collection, doc! {}).await?;
            if documents.is_empty() {
                tracing::warn!(
                    collection,
                    "Collection empty, backup skipped; any previous backup is kept"
                );
                report.skipped.push(collection.to_string());
                continue;
            }

            let backup = collections::backup_of(collection);
            let count = documents.len() as u64;
            self.store.delete_many(&backup, doc! {}).await?;
            self.store.insert_many(&backup, documents).await?;
            tracing::info!(collection, backup = %backup, count, "Collection backed up");
            report.backed_up.push(CollectionCount {
                collection: collection.to_string(),
                count,
            });
        }

        tracing::info!(total = report.total(), "Backup complete");
        Ok(report)
    }

    /// Back up, then rebuild the destination from the legacy collections
    ///
    /// Refuses with `AlreadyMigrated` when the destination holds records and
    /// `force` is not set; the backup is still committed.
    pub async fn migrate(&self, force: bool) -> Result<MigrationReport> {
        let backup = self.backup().await?;

        let existing = self
            .store
            .count(collections::SIMPLIFIED_LLM_CONFIGS)
            .await?;
        if existing > 0 && !force {
            tracing::warn!(
                existing,
                "Destination already populated, refusing to migrate without force"
            );
            return Err(ConfigError::AlreadyMigrated(existing));
        }

        tracing::info!("Migrating to simplified schema");
        let mut skipped_records = 0;

        let providers: Vec<ProviderDocument> = self
            .read_all(collections::LLM_PROVIDERS, &mut skipped_records)
            .await?;
        let catalogs: Vec<ModelCatalogDocument> = self
            .read_all(collections::MODEL_CATALOGS, &mut skipped_records)
            .await?;
        let configs: Vec<LegacyLlmConfig> = self
            .read_all(collections::LLM_CONFIGS, &mut skipped_records)
            .await?;
        tracing::info!(
            providers = providers.len(),
            configs = configs.len(),
            catalogs = catalogs.len(),
            "Legacy data read"
        );

        let mut report = MigrationReport {
            backup,
            providers_read: providers.len(),
            catalogs_read: catalogs.len(),
            configs_read: configs.len(),
            skipped_records,
            ..MigrationReport::default()
        };

        let lookup = LegacyLookup::new(providers, catalogs);
        for config in &configs {
            if lookup.provider(&config.provider).is_none()
                && !report.unmatched_providers.contains(&config.provider)
            {
                tracing::warn!(provider = %config.provider, "Config references unknown provider");
                report.unmatched_providers.push(config.provider.clone());
            }
        }

        let now = DateTime::now();
        let mut records: Vec<SimplifiedLlmConfig> = configs
            .into_iter()
            .map(|c| synthesize(c, &lookup, now))
            .collect();
        assign_default(&mut records);
        report.default_config = records
            .iter()
            .find(|r| r.is_default)
            .map(|r| format!("{}/{}", r.provider, r.model_name));

        let documents = records
            .iter()
            .map(bson::to_document)
            .collect::<std::result::Result<Vec<Document>, _>>()?;

        // Clear then insert: a crash in between leaves the destination empty,
        // recoverable only through rollback
        self.store
            .delete_many(collections::SIMPLIFIED_LLM_CONFIGS, doc! {})
            .await?;
        if documents.is_empty() {
            tracing::warn!("No legacy configs to migrate");
        } else {
            self.store
                .insert_many(collections::SIMPLIFIED_LLM_CONFIGS, documents)
                .await?;
        }
        report.migrated = records.len();
        tracing::info!(migrated = report.migrated, "Simplified configs written");
        Ok(report)
    }

    /// Check the destination's shape
    ///
    /// Zero documents is reported as `empty`; a sample missing any required
    /// field is a `SchemaMismatch`.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let destination_count = self
            .store
            .count(collections::SIMPLIFIED_LLM_CONFIGS)
            .await?;
        let mut backup_count = 0;
        for collection in collections::LEGACY {
            backup_count += self
                .store
                .count(&collections::backup_of(collection))
                .await?;
        }
        tracing::info!(destination_count, backup_count, "Validating migration");

        if destination_count == 0 {
            tracing::warn!("simplified_llm_configs is empty");
            return Ok(ValidationReport {
                destination_count,
                backup_count,
                empty: true,
            });
        }

        let sample = self
            .store
            .find_one(collections::SIMPLIFIED_LLM_CONFIGS, doc! {})
            .await?
            .unwrap_or_default();
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !sample.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            tracing::error!(?missing, "Destination sample is missing required fields");
            return Err(ConfigError::SchemaMismatch(missing));
        }

        tracing::info!("Data structure validated");
        Ok(ValidationReport {
            destination_count,
            backup_count,
            empty: false,
        })
    }

    /// Clear the destination and restore every legacy collection whose backup
    /// is non-empty
    ///
    /// A collection with an empty backup is left as is. If migrate ever
    /// cleared such a collection, an empty backup cannot be told apart from
    /// lost data.
    ///
    /// A backup is only refreshed when its collection is non-empty at backup
    /// time. A collection that was emptied after an earlier run keeps that
    /// run's backup, and rollback restores those stale documents.
    pub async fn rollback(&self) -> Result<RollbackReport> {
        tracing::info!("Rolling back migration");
        let cleared_destination = self
            .store
            .delete_many(collections::SIMPLIFIED_LLM_CONFIGS, doc! {})
            .await?;
        let mut report = RollbackReport {
            cleared_destination,
            ..RollbackReport::default()
        };

        for collection in collections::LEGACY {
            let backup = collections::backup_of(collection);
            let documents = self.store.find(&backup, doc! {}).await?;
            if documents.is_empty() {
                tracing::warn!(
                    collection,
                    "Backup empty, collection left untouched; an empty backup cannot be \
                     distinguished from lost data"
                );
                report.skipped.push(collection.to_string());
                continue;
            }

            let count = documents.len() as u64;
            self.store.delete_many(collection, doc! {}).await?;
            self.store.insert_many(collection, documents).await?;
            tracing::info!(collection, count, "Collection restored from backup");
            report.restored.push(CollectionCount {
                collection: collection.to_string(),
                count,
            });
        }

        tracing::info!("Rollback complete");
        Ok(report)
    }

    /// Migrate then validate
    pub async fn run(&self, force: bool) -> Result<RunReport> {
        let migration = self.migrate(force).await?;
        let validation = self.validate().await?;
        Ok(RunReport {
            migration,
            validation,
        })
    }

    async fn read_all<T>(&self, collection: &str, skipped: &mut usize) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let documents = self.store.find(collection, doc! {}).await?;
        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            match bson::from_document(document) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(collection, error = %e, "Skipping undecodable legacy record");
                    *skipped += 1;
                }
            }
        }
        Ok(records)
    }
}
