use std::path::PathBuf;

use thiserror::Error;

/// Core error type for gosling operations.
#[derive(Error, Debug)]
pub enum GoslingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0:?} driver not supported")]
    UnsupportedDialect(String),

    #[error("{0}=\"\" not supported")]
    EmptyConnectionString(&'static str),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid migration {}: {reason}", .path.display())]
    InvalidMigration { path: PathBuf, reason: String },

    #[error("found {} missing migration(s) older than the current version: {}", .0.len(), join_versions(.0))]
    MissingMigrations(Vec<i64>),

    #[error("no current version found")]
    NoCurrentVersion,

    #[error("no migration file found for version {0}")]
    VersionNotFound(i64),

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

fn join_versions(versions: &[i64]) -> String {
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<toml::de::Error> for GoslingError {
    fn from(e: toml::de::Error) -> Self {
        GoslingError::Config(format!("Failed to parse config: {}", e))
    }
}

/// Result type alias using GoslingError.
pub type Result<T> = std::result::Result<T, GoslingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_dialect_names_driver() {
        let err = GoslingError::UnsupportedDialect("oracle".into());
        assert_eq!(err.to_string(), "\"oracle\" driver not supported");
    }

    #[test]
    fn test_empty_connection_string_names_flag() {
        let err = GoslingError::EmptyConnectionString("--dbstring");
        assert_eq!(err.to_string(), "--dbstring=\"\" not supported");
    }

    #[test]
    fn test_missing_migrations_lists_versions() {
        let err = GoslingError::MissingMigrations(vec![2, 5]);
        let msg = err.to_string();
        assert!(msg.starts_with("found 2 missing"));
        assert!(msg.ends_with("2, 5"));
    }
}
