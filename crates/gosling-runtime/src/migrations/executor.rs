use std::time::{Duration, Instant};

use sqlx::AnyPool;
use tracing::{debug, info};

use gosling_core::error::{GoslingError, Result};

use super::ledger::Ledger;
use super::planner::Direction;
use super::source::{Migration, Section};

/// Executes migration steps against a database.
pub struct MigrationExecutor<'a> {
    pool: &'a AnyPool,
    ledger: &'a Ledger,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(pool: &'a AnyPool, ledger: &'a Ledger) -> Self {
        Self { pool, ledger }
    }

    /// Run one direction of a migration and update the ledger.
    ///
    /// Statements and the ledger update share a transaction unless the file
    /// is marked `NO TRANSACTION`.
    pub async fn execute(&self, migration: &Migration, direction: Direction) -> Result<Duration> {
        let section = match direction {
            Direction::Up => &migration.up,
            Direction::Down => &migration.down,
        };
        let verb = match direction {
            Direction::Up => "Applying",
            Direction::Down => "Rolling back",
        };
        info!("{} migration: {}", verb, migration.file_name());

        let start = Instant::now();
        if section.use_transaction {
            self.execute_in_transaction(migration, section, direction)
                .await?;
        } else {
            self.execute_direct(migration, section, direction).await?;
        }
        let elapsed = start.elapsed();

        debug!(
            "Migration {} finished in {:?}",
            migration.file_name(),
            elapsed
        );
        Ok(elapsed)
    }

    async fn execute_in_transaction(
        &self,
        migration: &Migration,
        section: &Section,
        direction: Direction,
    ) -> Result<()> {
        let dialect = self.ledger.dialect();
        if !dialect.supports_transactional_ddl() {
            debug!(
                "{} commits DDL implicitly; {} is only partially transactional",
                dialect,
                migration.file_name()
            );
        }

        let mut transaction = self.pool.begin().await.map_err(|e| {
            GoslingError::Database(format!("Failed to start transaction: {}", e))
        })?;

        for statement in &section.statements {
            sqlx::query(statement)
                .execute(&mut *transaction)
                .await
                .map_err(|e| statement_error(migration, direction, e))?;
        }

        match direction {
            Direction::Up => {
                self.ledger
                    .record(&mut *transaction, migration.version, &migration.name)
                    .await?
            }
            Direction::Down => {
                self.ledger
                    .remove(&mut *transaction, migration.version)
                    .await?
            }
        }

        transaction.commit().await.map_err(|e| {
            GoslingError::Database(format!(
                "Failed to commit migration {}: {}",
                migration.file_name(),
                e
            ))
        })?;

        Ok(())
    }

    async fn execute_direct(
        &self,
        migration: &Migration,
        section: &Section,
        direction: Direction,
    ) -> Result<()> {
        for statement in &section.statements {
            sqlx::query(statement)
                .execute(self.pool)
                .await
                .map_err(|e| statement_error(migration, direction, e))?;
        }

        match direction {
            Direction::Up => {
                self.ledger
                    .record(self.pool, migration.version, &migration.name)
                    .await
            }
            Direction::Down => self.ledger.remove(self.pool, migration.version).await,
        }
    }
}

fn statement_error(migration: &Migration, direction: Direction, e: sqlx::Error) -> GoslingError {
    let action = match direction {
        Direction::Up => "apply",
        Direction::Down => "roll back",
    };
    GoslingError::Migration(format!(
        "Failed to {} {}: {}",
        action,
        migration.file_name(),
        e
    ))
}
