//! Version ledger: the table recording which migrations are applied.

use chrono::{DateTime, Utc};
use sqlx::{Any, AnyPool, Executor, Row};
use tracing::debug;

use gosling_core::config::Dialect;
use gosling_core::error::{GoslingError, Result};

use super::dialect::LedgerSql;

/// A migration recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Highest applied version, or 0 when nothing is applied.
pub fn current_version(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.version).max().unwrap_or(0)
}

/// Reads and writes the ledger table.
#[derive(Debug, Clone)]
pub struct Ledger {
    sql: LedgerSql,
}

impl Ledger {
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Self {
        Self {
            sql: LedgerSql::new(dialect, table),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.sql.dialect()
    }

    pub fn table(&self) -> &str {
        self.sql.table()
    }

    /// Create the ledger table if it does not exist.
    pub async fn ensure_table(&self, pool: &AnyPool) -> Result<()> {
        sqlx::query(&self.sql.create_table())
            .execute(pool)
            .await
            .map_err(|e| {
                GoslingError::Database(format!(
                    "Failed to create ledger table {}: {}",
                    self.table(),
                    e
                ))
            })?;
        Ok(())
    }

    /// All applied migrations, ascending by version.
    pub async fn applied(&self, pool: &AnyPool) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&self.sql.list())
            .fetch_all(pool)
            .await
            .map_err(|e| GoslingError::Database(format!("Failed to read ledger: {}", e)))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let version: i64 = row.try_get("version_id")?;
            let name: String = row.try_get("name")?;
            let applied_at: String = row.try_get("applied_at")?;
            let applied_at = DateTime::parse_from_rfc3339(&applied_at)
                .map_err(|e| {
                    GoslingError::Database(format!(
                        "Invalid applied_at {:?} for version {}: {}",
                        applied_at, version, e
                    ))
                })?
                .with_timezone(&Utc);

            entries.push(LedgerEntry {
                version,
                name,
                applied_at,
            });
        }

        debug!("Ledger {} holds {} entries", self.table(), entries.len());
        Ok(entries)
    }

    /// Record `version` as applied.
    pub async fn record<'e, E>(&self, executor: E, version: i64, name: &str) -> Result<()>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query(&self.sql.insert())
            .bind(version)
            .bind(name.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(executor)
            .await
            .map_err(|e| {
                GoslingError::Database(format!("Failed to record version {}: {}", version, e))
            })?;
        Ok(())
    }

    /// Remove `version` from the ledger.
    pub async fn remove<'e, E>(&self, executor: E, version: i64) -> Result<()>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query(&self.sql.delete())
            .bind(version)
            .execute(executor)
            .await
            .map_err(|e| {
                GoslingError::Database(format!("Failed to remove version {}: {}", version, e))
            })?;
        Ok(())
    }
}
