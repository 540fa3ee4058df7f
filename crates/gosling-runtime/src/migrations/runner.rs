//! Migration runner: ties source, ledger, planner and executor together.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use gosling_core::config::{Settings, DEFAULT_TABLE};
use gosling_core::error::{GoslingError, Result};

use super::executor::MigrationExecutor;
use super::ledger::{Ledger, LedgerEntry};
use super::planner::{Direction, MissingPolicy, Planner, Step};
use super::source::{load_migrations, Migration};
use crate::db::Database;

/// Where migrations live and how the ledger is kept.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dir: PathBuf,
    pub table: String,
    pub policy: MissingPolicy,
}

impl RunOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            table: DEFAULT_TABLE.to_string(),
            policy: MissingPolicy::Strict,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dir: settings.dir.clone(),
            table: settings.table.clone(),
            policy: MissingPolicy::from_allow(settings.allow_missing),
        }
    }
}

/// What a migrating command changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Files applied, in order.
    pub applied: Vec<String>,
    /// Files rolled back, in order.
    pub rolled_back: Vec<String>,
    /// Version after the run.
    pub current_version: i64,
}

/// State of one known version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub version: i64,
    pub file_name: String,
    /// `None` while pending.
    pub applied_at: Option<DateTime<Utc>>,
    /// False when the ledger knows a version whose file is gone.
    pub has_file: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub entries: Vec<StatusEntry>,
    pub current_version: i64,
}

impl StatusReport {
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| e.applied_at.is_none()).count()
    }

    pub fn applied(&self) -> usize {
        self.entries.len() - self.pending()
    }
}

/// Runs migrations from a directory against one database.
pub struct MigrationRunner<'a> {
    db: &'a Database,
    ledger: Ledger,
    options: RunOptions,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(db: &'a Database, options: RunOptions) -> Self {
        Self {
            db,
            ledger: Ledger::new(db.dialect(), options.table.clone()),
            options,
        }
    }

    /// Load migration files and ledger entries, creating the ledger if needed.
    async fn load(&self) -> Result<(Vec<Migration>, Vec<LedgerEntry>)> {
        let migrations = load_migrations(&self.options.dir)?;
        self.ledger.ensure_table(self.db.pool()).await?;
        let applied = self.ledger.applied(self.db.pool()).await?;
        debug!(
            "{} migrations on disk, {} applied",
            migrations.len(),
            applied.len()
        );
        Ok((migrations, applied))
    }

    async fn plan<F>(&self, plan: F) -> Result<RunReport>
    where
        F: FnOnce(&Planner) -> Result<Vec<Step>>,
    {
        let (migrations, applied) = self.load().await?;
        let planner = Planner::new(
            migrations.iter().map(|m| m.version),
            applied.iter().map(|e| e.version),
        );

        let steps = plan(&planner)?;
        if steps.is_empty() {
            info!(
                "No migrations to run. Current version: {}",
                planner.current_version()
            );
            return Ok(RunReport {
                current_version: planner.current_version(),
                ..Default::default()
            });
        }

        self.run_steps(&migrations, &steps).await
    }

    async fn run_steps(&self, migrations: &[Migration], steps: &[Step]) -> Result<RunReport> {
        let by_version: HashMap<i64, &Migration> =
            migrations.iter().map(|m| (m.version, m)).collect();
        let executor = MigrationExecutor::new(self.db.pool(), &self.ledger);
        let mut report = RunReport::default();

        for step in steps {
            let migration = by_version
                .get(&step.version)
                .ok_or(GoslingError::VersionNotFound(step.version))?;

            executor.execute(migration, step.direction).await?;

            match step.direction {
                Direction::Up => report.applied.push(migration.file_name()),
                Direction::Down => report.rolled_back.push(migration.file_name()),
            }
        }

        report.current_version = self.version().await?;
        info!("Current version: {}", report.current_version);
        Ok(report)
    }

    /// Apply all pending migrations.
    pub async fn up(&self) -> Result<RunReport> {
        let policy = self.options.policy;
        self.plan(|p| p.up(None, policy)).await
    }

    /// Apply pending migrations up to and including `version`.
    pub async fn up_to(&self, version: i64) -> Result<RunReport> {
        let policy = self.options.policy;
        self.plan(|p| p.up(Some(version), policy)).await
    }

    /// Apply the next pending migration.
    pub async fn up_by_one(&self) -> Result<RunReport> {
        let policy = self.options.policy;
        self.plan(|p| p.up_by_one(policy)).await
    }

    /// Roll back the latest migration.
    pub async fn down(&self) -> Result<RunReport> {
        self.plan(Planner::down).await
    }

    /// Roll back every migration newer than `version`.
    pub async fn down_to(&self, version: i64) -> Result<RunReport> {
        self.plan(|p| p.down_to(version)).await
    }

    /// Roll back and re-apply the latest migration.
    pub async fn redo(&self) -> Result<RunReport> {
        self.plan(Planner::redo).await
    }

    /// Roll back every applied migration.
    pub async fn reset(&self) -> Result<RunReport> {
        self.plan(|p| p.down_to(0)).await
    }

    /// Every known version with its applied state.
    pub async fn status(&self) -> Result<StatusReport> {
        let (migrations, applied) = self.load().await?;
        let planner = Planner::new(
            migrations.iter().map(|m| m.version),
            applied.iter().map(|e| e.version),
        );
        let files: HashMap<i64, &Migration> =
            migrations.iter().map(|m| (m.version, m)).collect();
        let rows: HashMap<i64, &LedgerEntry> = applied.iter().map(|e| (e.version, e)).collect();

        let entries = planner
            .status()
            .into_iter()
            .map(|state| {
                let entry = rows.get(&state.version);
                let file_name = match (files.get(&state.version), entry) {
                    (Some(m), _) => m.file_name(),
                    (None, Some(e)) => format!("{}_{}.sql", e.version, e.name),
                    (None, None) => format!("{}.sql", state.version),
                };
                StatusEntry {
                    version: state.version,
                    file_name,
                    applied_at: entry.map(|e| e.applied_at),
                    has_file: state.has_file,
                }
            })
            .collect();

        Ok(StatusReport {
            entries,
            current_version: planner.current_version(),
        })
    }

    /// Highest applied version, 0 when nothing is applied.
    pub async fn version(&self) -> Result<i64> {
        self.ledger.ensure_table(self.db.pool()).await?;
        let applied = self.ledger.applied(self.db.pool()).await?;
        Ok(super::ledger::current_version(&applied))
    }
}
