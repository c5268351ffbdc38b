// Schema migration commands

use anyhow::Result;
use llmconf_core::migration::CollectionCount;
use llmconf_core::{
    BackupReport, ConfigError, MigrationReport, Migrator, RollbackReport, ValidationReport,
};

use super::StoreArgs;
use crate::output::{print_field, OutputFormat};

async fn migrator(store: &StoreArgs) -> Result<Migrator> {
    let backend = store.connect().await?;
    Ok(Migrator::new(backend.into_shared()))
}

/// Actionable hint printed after a failed migration command
pub fn next_steps(error: &ConfigError) -> Option<&'static str> {
    match error {
        ConfigError::AlreadyMigrated(_) => Some(
            "Re-run with `llmconf migrate --force` to overwrite the simplified configs, \
             or `llmconf rollback` to restore the legacy collections.",
        ),
        ConfigError::SchemaMismatch(_) => {
            Some("Run `llmconf rollback` to restore the legacy collections from backup.")
        }
        ConfigError::StoreUnavailable(_) => Some(
            "Check MONGODB_CONNECTION_STRING (or MONGODB_HOST/MONGODB_PORT) and that the \
             server is reachable.",
        ),
        _ => None,
    }
}

pub async fn backup(store: &StoreArgs, output: OutputFormat) -> Result<()> {
    let report = migrator(store).await?.backup().await?;
    if output.is_text() {
        print_backup(&report);
    } else {
        output.print_value(&report)?;
    }
    Ok(())
}

pub async fn migrate(store: &StoreArgs, output: OutputFormat, quiet: bool, force: bool) -> Result<()> {
    let report = migrator(store).await?.run(force).await?;
    if output.is_text() {
        if quiet {
            println!("{}", report.migration.migrated);
        } else {
            print_migration(&report.migration);
            print_validation(&report.validation);
            println!();
            println!("Migration complete. Use `llmconf rollback` to restore the legacy collections.");
        }
    } else {
        output.print_value(&report)?;
    }
    Ok(())
}

pub async fn validate(store: &StoreArgs, output: OutputFormat) -> Result<()> {
    let report = migrator(store).await?.validate().await?;
    if output.is_text() {
        print_validation(&report);
    } else {
        output.print_value(&report)?;
    }
    Ok(())
}

pub async fn rollback(store: &StoreArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    let report = migrator(store).await?.rollback().await?;
    if output.is_text() {
        if !quiet {
            print_rollback(&report);
        }
    } else {
        output.print_value(&report)?;
    }
    Ok(())
}

fn print_counts(label: &str, counts: &[CollectionCount]) {
    for count in counts {
        print_field(label, &format!("{} ({})", count.collection, count.count));
    }
}

fn print_backup(report: &BackupReport) {
    print_counts("Backed up", &report.backed_up);
    for collection in &report.skipped {
        print_field("Skipped (empty)", collection);
    }
    if !report.skipped.is_empty() {
        println!("Warning: previous backups of skipped collections were kept and may be stale.");
    }
    print_field("Total", &report.total().to_string());
}

fn print_migration(report: &MigrationReport) {
    print_backup(&report.backup);
    print_field("Providers", &report.providers_read.to_string());
    print_field("Catalogs", &report.catalogs_read.to_string());
    print_field("Configs", &report.configs_read.to_string());
    print_field("Migrated", &report.migrated.to_string());
    if report.skipped_records > 0 {
        print_field("Undecodable", &report.skipped_records.to_string());
    }
    if !report.unmatched_providers.is_empty() {
        print_field("Unknown providers", &report.unmatched_providers.join(", "));
    }
    print_field(
        "Default",
        report.default_config.as_deref().unwrap_or("(none enabled)"),
    );
}

fn print_validation(report: &ValidationReport) {
    print_field("Simplified configs", &report.destination_count.to_string());
    print_field("Backup documents", &report.backup_count.to_string());
    if report.empty {
        println!("Warning: simplified_llm_configs is empty");
    }
}

fn print_rollback(report: &RollbackReport) {
    print_field("Cleared", &report.cleared_destination.to_string());
    print_counts("Restored", &report.restored);
    for collection in &report.skipped {
        print_field("Untouched", collection);
    }
    if !report.skipped.is_empty() {
        println!(
            "Warning: collections with an empty backup were left as is; \
             an empty backup cannot be told apart from lost data."
        );
    }
    if !report.restored.is_empty() {
        println!(
            "Warning: a backup is not refreshed while its collection is empty, \
             so restored data may come from an earlier migration run."
        );
    }
}
