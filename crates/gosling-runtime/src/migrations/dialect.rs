//! Dialect-specific SQL for the version ledger.

use gosling_core::config::Dialect;

/// Renders ledger statements for one dialect and table.
#[derive(Debug, Clone)]
pub struct LedgerSql {
    dialect: Dialect,
    table: String,
}

impl LedgerSql {
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Bind parameter `n` (1-based).
    fn param(&self, n: usize) -> String {
        if self.dialect.numbered_placeholders() {
            format!("${}", n)
        } else {
            "?".to_string()
        }
    }

    pub fn create_table(&self) -> String {
        // applied_at holds RFC 3339 text
        match self.dialect {
            Dialect::Redshift => format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 version_id BIGINT NOT NULL, \
                 name VARCHAR(255) NOT NULL, \
                 applied_at VARCHAR(64) NOT NULL, \
                 PRIMARY KEY (version_id))",
                self.table
            ),
            _ => format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 version_id BIGINT NOT NULL PRIMARY KEY, \
                 name VARCHAR(255) NOT NULL, \
                 applied_at VARCHAR(64) NOT NULL)",
                self.table
            ),
        }
    }

    pub fn insert(&self) -> String {
        format!(
            "INSERT INTO {} (version_id, name, applied_at) VALUES ({}, {}, {})",
            self.table,
            self.param(1),
            self.param(2),
            self.param(3)
        )
    }

    pub fn delete(&self) -> String {
        format!(
            "DELETE FROM {} WHERE version_id = {}",
            self.table,
            self.param(1)
        )
    }

    pub fn list(&self) -> String {
        format!(
            "SELECT version_id, name, applied_at FROM {} ORDER BY version_id ASC",
            self.table
        )
    }
}
