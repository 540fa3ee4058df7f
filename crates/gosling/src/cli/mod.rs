mod migrate;

pub use migrate::{Invocation, MigrateCommand};

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser};

use gosling_core::config::{EnvVars, FileConfig, Overrides, Settings};

const COMMANDS_HELP: &str = "\
Examples:
    gosling status
    gosling create init
    gosling --dialect sqlite3 --dbstring ./foo.db status
    gosling --dir db/migrations up-to 20240101000000

Commands:
    up                   Migrate the DB to the most recent version available
    up-by-one            Migrate the DB up by 1
    up-to VERSION        Migrate the DB to a specific VERSION
    down                 Roll back the version by 1
    down-to VERSION      Roll back to a specific VERSION
    redo                 Re-run the latest migration
    reset                Roll back all migrations
    status               Dump the migration status for the current DB
    version              Print the current version of the database
    create NAME [sql]    Creates new migration file with the current timestamp

Environment:
    DATABASE_DIALECT, DATABASE_USERNAME (or DATABASE_USER), DATABASE_PASSWORD,
    DATABASE_HOST, DATABASE_PORT, DATABASE_NAME, MIGRATION_PATH";

/// Database migrations driven by SQL files.
#[derive(Parser, Debug)]
#[command(name = "gosling")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "gosling [OPTIONS] COMMAND [ARGS]...")]
#[command(after_help = COMMANDS_HELP)]
pub struct Cli {
    /// Directory with migration files [default: ./$MIGRATION_PATH]
    #[arg(long)]
    pub dir: Option<String>,

    /// Connection string [default: built from DATABASE_* variables]
    #[arg(long)]
    pub dbstring: Option<String>,

    /// Database dialect: postgres, mysql, sqlite3 or redshift
    #[arg(long)]
    pub dialect: Option<String>,

    /// Table that records applied versions
    #[arg(long)]
    pub table: Option<String>,

    /// Apply pending migrations older than the current version
    #[arg(long)]
    pub allow_missing: bool,

    /// Configuration file path [default: gosling.toml when present]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Fail when the environment file cannot be loaded
    #[arg(long)]
    pub require_env_file: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to run
    pub command: Option<String>,

    /// Arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        load_env_file(self.env_file.as_deref(), self.require_env_file)?;
        init_tracing(self.verbose);

        let Some(invocation) = Invocation::new(self.command.as_deref(), &self.args) else {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        };

        let file = FileConfig::discover(self.config.as_deref())?;
        let settings = Settings::resolve(&self.overrides(), &EnvVars::from_process(), &file)?;

        MigrateCommand::new(invocation, settings).execute().await
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            dir: self.dir.clone(),
            dbstring: self.dbstring.clone(),
            dialect: self.dialect.clone(),
            table: self.table.clone(),
            allow_missing: self.allow_missing,
        }
    }
}

/// Load `path`, or `.env` from the working directory.
///
/// A missing default file is fine unless `required`; an explicit path must exist.
fn load_env_file(path: Option<&Path>, required: bool) -> Result<()> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };

    match loaded {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() && path.is_none() && !required => Ok(()),
        Err(e) => Err(anyhow!("Error loading .env file: {}", e)),
    }
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        "warn,gosling_runtime=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
