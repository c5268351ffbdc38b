// Connection resolution for the document store
//
// Pure string assembly, no network I/O. The resolved target is memoized in
// the resolver: the first resolution wins and is never recomputed.

use std::sync::OnceLock;

use serde::Serialize;

use crate::env::EnvVars;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: &str = "27017";
pub const DEFAULT_AUTH_SOURCE: &str = "admin";
pub const DEFAULT_DATABASE: &str = "tradingagents";

/// Where the document store lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTarget {
    pub connection_string: String,
    pub database_name: String,
}

impl ConnectionTarget {
    /// Connection string with any password replaced, safe for logs
    pub fn redacted(&self) -> String {
        redact_credentials(&self.connection_string)
    }
}

/// Explicit values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub connection_string: Option<String>,
    pub database_name: Option<String>,
}

/// Memoized resolver for the store connection target
#[derive(Debug)]
pub struct ConnectionResolver {
    env: EnvVars,
    overrides: ConnectionOverrides,
    resolved: OnceLock<ConnectionTarget>,
}

impl ConnectionResolver {
    pub fn new(env: EnvVars) -> Self {
        Self::with_overrides(env, ConnectionOverrides::default())
    }

    pub fn with_overrides(env: EnvVars, overrides: ConnectionOverrides) -> Self {
        Self {
            env,
            overrides,
            resolved: OnceLock::new(),
        }
    }

    /// Resolve the connection target, computing it at most once
    pub fn resolve_connection(&self) -> &ConnectionTarget {
        self.resolved.get_or_init(|| {
            let target = build_target(&self.env, &self.overrides);
            tracing::debug!(
                connection = %target.redacted(),
                database = %target.database_name,
                "Resolved document store connection"
            );
            target
        })
    }
}

fn build_target(env: &EnvVars, overrides: &ConnectionOverrides) -> ConnectionTarget {
    let database_name = overrides
        .database_name
        .clone()
        .or_else(|| {
            env.first_of(&["MONGODB_DATABASE", "MONGODB_DATABASE_NAME"])
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

    let connection_string = overrides
        .connection_string
        .clone()
        .or_else(|| {
            env.first_of(&["MONGODB_CONNECTION_STRING", "MONGO_URI"])
                .map(str::to_string)
        })
        .unwrap_or_else(|| assemble_from_components(env, &database_name));

    ConnectionTarget {
        connection_string,
        database_name,
    }
}

fn assemble_from_components(env: &EnvVars, database: &str) -> String {
    let host = env.get_or("MONGODB_HOST", DEFAULT_HOST);
    let port = env.get_or("MONGODB_PORT", DEFAULT_PORT);
    let auth_source = env.get_or("MONGODB_AUTH_SOURCE", DEFAULT_AUTH_SOURCE);

    match (env.get("MONGODB_USERNAME"), env.get("MONGODB_PASSWORD")) {
        (Some(user), Some(password)) => format!(
            "mongodb://{}:{}@{}:{}/{}?authSource={}",
            urlencoding::encode(user),
            urlencoding::encode(password),
            host,
            port,
            database,
            auth_source
        ),
        _ => format!("mongodb://{}:{}/{}", host, port, database),
    }
}

fn redact_credentials(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://") else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end + 3..];
    // Unencoded passwords may contain '@'; the host follows the last one
    let Some(at) = rest.rfind('@') else {
        return uri.to_string();
    };
    let userinfo = &rest[..at];
    let user = userinfo.split(':').next().unwrap_or_default();
    format!("{}{}:****{}", &uri[..scheme_end + 3], user, &rest[at..])
}
