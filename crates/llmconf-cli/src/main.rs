// llmconf CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Logs go to stderr so json/yaml output stays machine-readable.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use llmconf_core::{ConfigError, ConnectionOverrides, EnvVars};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::StoreArgs;

#[derive(Parser)]
#[command(name = "llmconf")]
#[command(about = "llmconf - Resolve LLM provider configs and migrate their schema")]
#[command(version)]
pub struct Cli {
    /// MongoDB connection string (overrides MONGODB_CONNECTION_STRING / MONGO_URI)
    #[arg(long, global = true)]
    pub connection_string: Option<String>,

    /// Database name (overrides MONGODB_DATABASE / MONGODB_DATABASE_NAME)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Back up, migrate the legacy collections, then validate
    Migrate {
        /// Overwrite an already populated simplified_llm_configs
        #[arg(long)]
        force: bool,
    },

    /// Restore the legacy collections from backup and clear the simplified configs
    Rollback,

    /// Check the shape of simplified_llm_configs
    Validate,

    /// Snapshot the legacy collections into their _backup siblings
    Backup,

    /// Show the resolved LLM configs and the active one
    Resolve {
        /// Only show the first enabled config for this provider
        #[arg(long, short)]
        provider: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llmconf_core=info,llmconf_storage=info,llmconf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = output::OutputFormat::from_str(&cli.output);
    let env = EnvVars::from_process();
    let store = StoreArgs {
        env: env.clone(),
        overrides: ConnectionOverrides {
            connection_string: cli.connection_string,
            database_name: cli.database,
        },
    };

    match cli.command {
        Commands::Migrate { force } => {
            commands::migrate::migrate(&store, output_format, cli.quiet, force).await
        }
        Commands::Rollback => commands::migrate::rollback(&store, output_format, cli.quiet).await,
        Commands::Validate => commands::migrate::validate(&store, output_format).await,
        Commands::Backup => commands::migrate::backup(&store, output_format).await,
        Commands::Resolve { provider } => {
            commands::resolve::run(&store, env, output_format, provider).await
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e
            .downcast_ref::<ConfigError>()
            .and_then(commands::migrate::next_steps)
        {
            eprintln!();
            eprintln!("Next steps: {}", hint);
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "llmconf",
            "migrate",
            "--force",
            "--output",
            "json",
            "--database",
            "staging",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Migrate { force: true }));
        assert_eq!(cli.output, "json");
        assert_eq!(cli.database.as_deref(), Some("staging"));
    }

    #[test]
    fn test_resolve_provider_flag() {
        let cli = Cli::try_parse_from(["llmconf", "resolve", "--provider", "deepseek"]).unwrap();
        match cli.command {
            Commands::Resolve { provider } => assert_eq!(provider.as_deref(), Some("deepseek")),
            _ => panic!("expected resolve"),
        }
    }
}
