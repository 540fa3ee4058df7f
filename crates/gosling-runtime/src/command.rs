//! String command boundary of the engine.
//!
//! Callers hand over a command name and its raw arguments; parsing and
//! execution both live here.

use std::path::PathBuf;

use gosling_core::error::{GoslingError, Result};

use crate::db::Database;
use crate::migrations::{MigrationGenerator, MigrationRunner, RunOptions, RunReport, StatusReport};

/// An engine command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Up,
    UpByOne,
    UpTo(i64),
    Down,
    DownTo(i64),
    Redo,
    Reset,
    Status,
    Version,
    Create { name: String, kind: String },
}

impl Command {
    /// Parse a command name and the arguments that follow it.
    pub fn parse(name: &str, args: &[String]) -> Result<Self> {
        let command = match name {
            "up" => Command::Up,
            "up-by-one" => Command::UpByOne,
            "up-to" => Command::UpTo(parse_version(name, args)?),
            "down" => Command::Down,
            "down-to" => Command::DownTo(parse_version(name, args)?),
            "redo" => Command::Redo,
            "reset" => Command::Reset,
            "status" => Command::Status,
            "version" => Command::Version,
            "create" => {
                let (name, kind) = match args {
                    [name] => (name.clone(), "sql".to_string()),
                    [name, kind] => (name.clone(), kind.clone()),
                    _ => {
                        return Err(GoslingError::InvalidArgument(
                            "create must be of form: create NAME [TYPE]".to_string(),
                        ))
                    }
                };
                return Ok(Command::Create { name, kind });
            }
            other => return Err(GoslingError::UnknownCommand(other.to_string())),
        };

        let expected = match command {
            Command::UpTo(_) | Command::DownTo(_) => 1,
            _ => 0,
        };
        if args.len() > expected {
            return Err(GoslingError::InvalidArgument(format!(
                "unexpected arguments for {}: {}",
                name,
                args[expected..].join(" ")
            )));
        }

        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Up => "up",
            Command::UpByOne => "up-by-one",
            Command::UpTo(_) => "up-to",
            Command::Down => "down",
            Command::DownTo(_) => "down-to",
            Command::Redo => "redo",
            Command::Reset => "reset",
            Command::Status => "status",
            Command::Version => "version",
            Command::Create { .. } => "create",
        }
    }

    /// Only `create` works without a database connection.
    pub fn needs_database(&self) -> bool {
        !matches!(self, Command::Create { .. })
    }
}

fn parse_version(command: &str, args: &[String]) -> Result<i64> {
    let raw = args.first().ok_or_else(|| {
        GoslingError::InvalidArgument(format!("{} must be of form: {} VERSION", command, command))
    })?;
    raw.parse().map_err(|_| {
        GoslingError::InvalidArgument(format!("{} VERSION must be a number, got {:?}", command, raw))
    })
}

/// Result of a command, for the caller to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Migrated(RunReport),
    Status(StatusReport),
    Version(i64),
    Created(PathBuf),
}

/// Execute `command` against `db` with migrations from `options.dir`.
pub async fn run(command: &Command, db: Option<&Database>, options: &RunOptions) -> Result<Outcome> {
    let outcome = match command {
        Command::Create { name, kind } => {
            Outcome::Created(MigrationGenerator::new(&options.dir).create(name, kind)?)
        }
        Command::Up => Outcome::Migrated(runner(command, db, options)?.up().await?),
        Command::UpByOne => Outcome::Migrated(runner(command, db, options)?.up_by_one().await?),
        Command::UpTo(version) => {
            Outcome::Migrated(runner(command, db, options)?.up_to(*version).await?)
        }
        Command::Down => Outcome::Migrated(runner(command, db, options)?.down().await?),
        Command::DownTo(version) => {
            Outcome::Migrated(runner(command, db, options)?.down_to(*version).await?)
        }
        Command::Redo => Outcome::Migrated(runner(command, db, options)?.redo().await?),
        Command::Reset => Outcome::Migrated(runner(command, db, options)?.reset().await?),
        Command::Status => Outcome::Status(runner(command, db, options)?.status().await?),
        Command::Version => Outcome::Version(runner(command, db, options)?.version().await?),
    };

    Ok(outcome)
}

fn runner<'a>(
    command: &Command,
    db: Option<&'a Database>,
    options: &RunOptions,
) -> Result<MigrationRunner<'a>> {
    let db = db.ok_or_else(|| {
        GoslingError::Config(format!("{} requires a database connection", command.name()))
    })?;
    Ok(MigrationRunner::new(db, options.clone()))
}
