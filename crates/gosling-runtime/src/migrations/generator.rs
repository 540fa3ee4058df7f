use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use gosling_core::error::{GoslingError, Result};

/// Kinds of migration file `create` can produce.
pub const SUPPORTED_KINDS: [&str; 1] = ["sql"];

/// Writes new, empty migration files.
pub struct MigrationGenerator {
    /// Output directory for migrations.
    output_dir: PathBuf,
}

impl MigrationGenerator {
    /// Create a new migration generator.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create a migration file stamped with the current time.
    pub fn create(&self, name: &str, kind: &str) -> Result<PathBuf> {
        self.create_at(name, kind, Utc::now())
    }

    /// Create a migration file stamped with `now`.
    pub fn create_at(&self, name: &str, kind: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        if !SUPPORTED_KINDS.contains(&kind) {
            return Err(GoslingError::InvalidArgument(format!(
                "migration type must be one of {:?}, got {:?}",
                SUPPORTED_KINDS, kind
            )));
        }

        let name = snake_case(name);
        if name.is_empty() {
            return Err(GoslingError::InvalidArgument(
                "migration name must not be empty".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.output_dir)?;

        let version = now.format("%Y%m%d%H%M%S");
        let path = self
            .output_dir
            .join(format!("{}_{}.{}", version, name, kind));
        let content = format!(
            "-- Migration: {}\n\
             -- Created at: {}\n\n\
             -- +gosling Up\n\
             -- SQL in this section is executed when the migration is applied.\n\n\
             -- +gosling Down\n\
             -- SQL in this section is executed when the migration is rolled back.\n",
            name,
            now.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => GoslingError::InvalidArgument(format!(
                    "migration file already exists: {}",
                    path.display()
                )),
                _ => GoslingError::Io(e),
            })?;
        file.write_all(content.as_bytes())?;
        info!("Created new migration {}", path.display());

        Ok(path)
    }
}

/// Lower-case `name`, turning separators and camel-case humps into `_`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;

    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_numeric();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }

    out.trim_end_matches('_').to_string()
}
