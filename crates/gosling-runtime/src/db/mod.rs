use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use gosling_core::config::Dialect;
use gosling_core::error::{GoslingError, Result};

/// Seconds to wait for the connection before giving up.
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// A single database connection for one invocation.
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

impl Database {
    /// Open a connection for `dialect` using `dbstring`.
    ///
    /// A sqlite3 `dbstring` may be a plain file path.
    pub async fn connect(dialect: Dialect, dbstring: &str) -> Result<Self> {
        let url = dialect.connection_url(dbstring)?;
        sqlx::any::install_default_drivers();

        // one-shot runs never need more than one connection
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect(&url)
            .await
            .map_err(|e| {
                GoslingError::Database(format!("Failed to open {} database: {}", dialect, e))
            })?;

        debug!("Connected to {} database", dialect);
        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| GoslingError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database connection closed");
    }
}
