mod database;
mod env;

pub use database::{connection_string, DatabaseConfig, Dialect};
pub use env::EnvVars;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{GoslingError, Result};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "gosling.toml";

/// Default name of the version ledger table.
pub const DEFAULT_TABLE: &str = "gosling_db_version";

/// Default migrations directory when neither flag nor `MIGRATION_PATH` is set.
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

/// Root of the optional `gosling.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration source configuration.
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        debug!("Loading config from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GoslingError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if given, else the default file if it exists.
    ///
    /// An explicitly requested file must exist.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }
}

/// Migration source section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding migration files.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Ledger table name.
    #[serde(default)]
    pub table: Option<String>,

    /// Apply pending migrations older than the current version.
    #[serde(default)]
    pub allow_missing: bool,
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dir: Option<String>,
    pub dbstring: Option<String>,
    pub dialect: Option<String>,
    pub table: Option<String>,
    pub allow_missing: bool,
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Dialect name as given; checked by [`Settings::dialect`].
    pub dialect: String,
    pub dbstring: String,
    pub dir: PathBuf,
    pub table: String,
    pub allow_missing: bool,
}

impl Settings {
    /// Merge flags, environment and config file.
    ///
    /// Each field takes the first non-empty value from the flag, the
    /// environment and the file, in that order, then the built-in default.
    /// The connection string is assembled from `DATABASE_*` variables for the
    /// resolved dialect when neither flag nor file provides one.
    pub fn resolve(overrides: &Overrides, env: &EnvVars, file: &FileConfig) -> Result<Self> {
        let dialect = first_non_empty([
            overrides.dialect.as_deref(),
            env.get(EnvVars::DIALECT),
            file.database.dialect.as_deref(),
        ])
        .unwrap_or_default()
        .to_string();

        let dir = match first_non_empty([overrides.dir.as_deref()]) {
            Some(dir) => PathBuf::from(dir),
            None => match env.get(EnvVars::MIGRATION_PATH) {
                Some(path) => Path::new(".").join(path),
                None => file
                    .migrations
                    .dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            },
        };

        let dbstring = match first_non_empty([overrides.dbstring.as_deref()]) {
            Some(s) => s.to_string(),
            None => {
                let assembled = match dialect.parse::<Dialect>() {
                    Ok(d) => connection_string(d, env)?,
                    Err(_) => String::new(),
                };
                if assembled.is_empty() {
                    file.database.url.clone().unwrap_or_default()
                } else {
                    assembled
                }
            }
        };

        let table = first_non_empty([overrides.table.as_deref(), file.migrations.table.as_deref()])
            .unwrap_or(DEFAULT_TABLE)
            .to_string();

        Ok(Self {
            dialect,
            dbstring,
            dir,
            table,
            allow_missing: overrides.allow_missing || file.migrations.allow_missing,
        })
    }

    /// Check the dialect against the allow-list.
    pub fn dialect(&self) -> Result<Dialect> {
        self.dialect.parse()
    }

    /// Validate everything needed to open a database connection.
    pub fn validate(&self) -> Result<Dialect> {
        let dialect = self.dialect()?;
        if self.dbstring.is_empty() {
            return Err(GoslingError::EmptyConnectionString("--dbstring"));
        }
        dialect.connection_url(&self.dbstring)?;
        Ok(dialect)
    }
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}

/// Substitute `${VAR}` references with values from the process environment.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => result = result.replace(&cap[0], &value),
            Err(_) => warn!("Config references unset variable {}", var_name),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvVars {
        EnvVars::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn postgres_env() -> EnvVars {
        env(&[
            ("DATABASE_DIALECT", "postgres"),
            ("DATABASE_USERNAME", "app"),
            ("DATABASE_HOST", "localhost"),
            ("DATABASE_NAME", "shop"),
        ])
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = FileConfig::parse_toml("").unwrap();
        assert!(config.database.url.is_none());
        assert!(!config.migrations.allow_missing);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            dialect = "sqlite3"
            url = "sqlite://app.db"

            [migrations]
            dir = "db/migrations"
            table = "schema_versions"
            allow_missing = true
        "#;

        let config = FileConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.dialect.as_deref(), Some("sqlite3"));
        assert_eq!(config.migrations.dir, Some(PathBuf::from("db/migrations")));
        assert_eq!(config.migrations.table.as_deref(), Some("schema_versions"));
        assert!(config.migrations.allow_missing);
    }

    #[test]
    fn test_parse_invalid_config() {
        let err = FileConfig::parse_toml("[database").unwrap_err();
        assert!(matches!(err, GoslingError::Config(_)));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GOSLING_TEST_SUBST_URL", "postgres://sub/db");
        let config = FileConfig::parse_toml(
            r#"
            [database]
            url = "${GOSLING_TEST_SUBST_URL}"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.url.as_deref(), Some("postgres://sub/db"));
    }

    #[test]
    fn test_discover_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(FileConfig::discover(Some(&missing)).is_err());
    }

    #[test]
    fn test_defaults_without_anything() {
        let settings = Settings::resolve(&Overrides::default(), &env(&[]), &FileConfig::default()).unwrap();
        assert_eq!(settings.dir, PathBuf::from("./migrations"));
        assert_eq!(settings.table, DEFAULT_TABLE);
        assert_eq!(settings.dbstring, "");
        assert_eq!(settings.dialect, "");
    }

    #[test]
    fn test_migration_path_env() {
        let settings = Settings::resolve(
            &Overrides::default(),
            &env(&[("MIGRATION_PATH", "db/migrations")]),
            &FileConfig::default(),
        ).unwrap();
        assert_eq!(settings.dir, PathBuf::from("./db/migrations"));
    }

    #[test]
    fn test_flags_override_environment() {
        let overrides = Overrides {
            dir: Some("custom".into()),
            dbstring: Some("postgres://flag/db".into()),
            dialect: Some("redshift".into()),
            ..Default::default()
        };
        let vars = env(&[
            ("DATABASE_DIALECT", "postgres"),
            ("DATABASE_HOST", "localhost"),
            ("DATABASE_NAME", "shop"),
            ("MIGRATION_PATH", "from_env"),
        ]);

        let settings = Settings::resolve(&overrides, &vars, &FileConfig::default()).unwrap();
        assert_eq!(settings.dir, PathBuf::from("custom"));
        assert_eq!(settings.dbstring, "postgres://flag/db");
        assert_eq!(settings.dialect, "redshift");
    }

    #[test]
    fn test_empty_flag_falls_back_to_environment() {
        let overrides = Overrides {
            dbstring: Some(String::new()),
            ..Default::default()
        };
        let settings = Settings::resolve(&overrides, &postgres_env(), &FileConfig::default()).unwrap();
        assert_eq!(settings.dbstring, "postgres://app@localhost/shop");
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = FileConfig::parse_toml(
            r#"
            [database]
            dialect = "mysql"
            url = "mysql://file/db"
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(&Overrides::default(), &postgres_env(), &file).unwrap();
        assert_eq!(settings.dialect, "postgres");
        assert_eq!(settings.dbstring, "postgres://app@localhost/shop");
    }

    #[test]
    fn test_file_used_when_environment_empty() {
        let file = FileConfig::parse_toml(
            r#"
            [database]
            dialect = "sqlite3"
            url = "sqlite://file.db"

            [migrations]
            dir = "sql"
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(&Overrides::default(), &env(&[]), &file).unwrap();
        assert_eq!(settings.dialect().unwrap(), Dialect::Sqlite3);
        assert_eq!(settings.dbstring, "sqlite://file.db");
        assert_eq!(settings.dir, PathBuf::from("sql"));
    }

    #[test]
    fn test_validate_rejects_unsupported_dialect() {
        let overrides = Overrides {
            dialect: Some("oracle".into()),
            dbstring: Some("oracle://x".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(&overrides, &env(&[]), &FileConfig::default()).unwrap();
        let err = settings.validate().unwrap_err();
        assert_eq!(err.to_string(), "\"oracle\" driver not supported");
    }

    #[test]
    fn test_validate_rejects_empty_dbstring() {
        let overrides = Overrides {
            dialect: Some("postgres".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(&overrides, &env(&[]), &FileConfig::default()).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("--dbstring"));
    }

    #[test]
    fn test_validate_accepts_every_supported_dialect() {
        for name in ["postgres", "mysql", "sqlite3", "redshift"] {
            let overrides = Overrides {
                dialect: Some(name.into()),
                dbstring: Some(format!("{}://localhost/db", name.parse::<Dialect>().unwrap().driver())),
                ..Default::default()
            };
            let settings = Settings::resolve(&overrides, &env(&[]), &FileConfig::default()).unwrap();
            assert_eq!(settings.validate().unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_validate_rejects_mismatched_scheme() {
        let overrides = Overrides {
            dialect: Some("postgres".into()),
            dbstring: Some("mysql://app@localhost/shop".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(&overrides, &env(&[]), &FileConfig::default()).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, GoslingError::Config(_)));
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn test_validate_accepts_sqlite_path() {
        let overrides = Overrides {
            dialect: Some("sqlite3".into()),
            dbstring: Some("./foo.db".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(&overrides, &env(&[]), &FileConfig::default()).unwrap();
        assert_eq!(settings.validate().unwrap(), Dialect::Sqlite3);
    }

    #[test]
    fn test_resolve_reports_bad_port() {
        let vars = env(&[
            ("DATABASE_DIALECT", "mysql"),
            ("DATABASE_HOST", "localhost"),
            ("DATABASE_PORT", "not-a-port"),
        ]);
        let err = Settings::resolve(&Overrides::default(), &vars, &FileConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_PORT"));
    }
}
